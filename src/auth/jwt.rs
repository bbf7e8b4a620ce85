/// Token Service
///
/// Issues and verifies HS256 bearer tokens. Stateless: no session table,
/// no revocation list. Verification checks the signature (and issuer)
/// first and only then compares expiry against the injected clock, so a
/// forged token never reports as merely expired.
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use crate::auth::claims::Claims;
use crate::auth::Principal;
use crate::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

pub const TOKEN_LIFETIME_DAYS: i64 = 7;
pub const TOKEN_LIFETIME_LABEL: &str = "7 days";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::TokenInvalid,
        }
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            clock,
        }
    }

    /// Sign a token for `principal`, valid for `TOKEN_LIFETIME_DAYS`
    pub fn issue(&self, principal: &Principal) -> Result<String, AppError> {
        let now = self.clock.now();
        let expires_at = now + Duration::days(TOKEN_LIFETIME_DAYS);
        let claims = Claims::new(
            principal,
            now.timestamp(),
            expires_at.timestamp(),
            &self.issuer,
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        // Expiry is checked below against the injected clock.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation error");
                TokenError::Invalid
            })?;

        if claims.is_expired_at(self.clock.now().timestamp()) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
