/// Password Hashing and Verification
///
/// bcrypt with a per-call random salt and a fixed cost taken from
/// configuration. Work runs on the blocking pool so the calling request
/// task suspends instead of stalling an executor thread.
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::auth::PasswordHash;
use crate::error::{AppError, ValidationError};

/// Storage-level floor. Signup applies the stricter policy in `validators`.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// bcrypt ignores everything past this many bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

const DUMMY_PASSWORD: &str = "dummy-password-never-assigned";

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    /// Hash at `cost` to verify against when no account matches
    dummy: Arc<OnceCell<PasswordHash>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            dummy: Arc::new(OnceCell::new()),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password
    ///
    /// # Errors
    /// - Validation (policy) if shorter than `MIN_PASSWORD_LENGTH` or longer
    ///   than `MAX_PASSWORD_BYTES`, before any hashing work is done
    /// - Internal if bcrypt fails or the blocking task is lost
    pub async fn hash(&self, plaintext: &str) -> Result<PasswordHash, AppError> {
        if plaintext.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::policy(
                "password",
                "Password must be at least 6 characters long",
            )
            .into());
        }

        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(ValidationError::policy(
                "password",
                "Password must be at most 72 bytes long",
            )
            .into());
        }

        let plaintext = plaintext.to_string();
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        Ok(PasswordHash::from_hasher(hash))
    }

    /// Spend the same bcrypt work as `verify` when there is no stored hash.
    /// Always false.
    pub async fn verify_absent(&self, plaintext: &str) -> Result<bool, AppError> {
        let dummy = self
            .dummy
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?;
        self.verify(plaintext, dummy).await?;
        Ok(false)
    }

    /// Verify a plaintext password against a stored hash
    ///
    /// bcrypt compares digests in constant time.
    pub async fn verify(&self, plaintext: &str, hash: &PasswordHash) -> Result<bool, AppError> {
        let plaintext = plaintext.to_string();
        let hash = hash.as_str().to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}
