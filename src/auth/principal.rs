/// Principal records
///
/// `UserRecord` is the stored row and carries the password hash.
/// `Principal` is the only shape that leaves the credential layer; it has
/// no hash field, so no serialization path can expose one.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Output of the password hasher. Only the hasher and the storage layer
/// (when loading rows) can construct one, so raw input can never be
/// persisted as a hash.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub(crate) fn from_hasher(hash: String) -> Self {
        Self(hash)
    }

    pub(crate) fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Authenticated identity exposed to route handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored user row
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub handle: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn into_principal(self) -> Principal {
        Principal {
            id: self.id,
            handle: self.handle,
            email: self.email,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row to insert. Handle and email are already normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub handle: String,
    pub email: String,
    pub password_hash: PasswordHash,
}
