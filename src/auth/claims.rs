/// JWT Claims structure
///
/// The signed payload: principal identity plus standard RFC 7519 fields.
/// Claims are immutable once issued.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,
    pub handle: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(principal: &Principal, issued_at: i64, expires_at: i64, issuer: &str) -> Self {
        Self {
            sub: principal.id.to_string(),
            handle: principal.handle.clone(),
            email: principal.email.clone(),
            iat: issued_at,
            exp: expires_at,
            iss: issuer.to_string(),
        }
    }

    /// `None` if the subject is not a UUID
    pub fn principal_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
