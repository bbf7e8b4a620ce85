/// Credential Store
///
/// Owns the identity -> password hash mapping on top of `UserStore`.
/// Every path that writes a password goes through `seal`, so storage
/// only ever receives hasher output.
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{NewUser, PasswordHash, PasswordHasher, Principal};
use crate::error::{AppError, AuthError, UniqueField, ValidationError};
use crate::storage::UserStore;

pub struct CredentialStore {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher) -> Self {
        Self { users, hasher }
    }

    /// Create a principal
    ///
    /// # Errors
    /// - Conflict naming the colliding field (handle wins when both collide),
    ///   whether found by the existence check or by the storage constraint
    /// - Validation (policy) if the password is below the storage floor
    pub async fn register(
        &self,
        handle: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, AppError> {
        let handle = normalize(handle);
        let email = normalize(email);

        if let Some(existing) = self.users.find_by_handle_or_email(&handle, &email).await? {
            let field = if existing.handle == handle {
                UniqueField::Handle
            } else {
                UniqueField::Email
            };
            return Err(AppError::Conflict(field));
        }

        let password_hash = self.seal(password).await?;
        let record = self
            .users
            .insert(NewUser {
                handle,
                email,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %record.id, "Principal registered");
        Ok(record.into_principal())
    }

    /// Check an email/password pair
    ///
    /// Unknown email and wrong password both yield
    /// `AuthError::InvalidCredentials` after the same bcrypt work.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, AppError> {
        let email = normalize(email);

        let record = match self.users.find_by_email(&email).await? {
            Some(record) => record,
            None => {
                self.hasher.verify_absent(password).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.hasher.verify(password, &record.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(record.into_principal())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        Ok(self.users.find_principal_by_id(id).await?)
    }

    pub async fn find_by_handle(&self, handle: &str) -> Result<Option<Principal>, AppError> {
        Ok(self.users.find_principal_by_handle(&normalize(handle)).await?)
    }

    /// Replace a principal's password after checking the current one
    pub async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let principal = self
            .users
            .find_principal_by_id(id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        let record = self
            .users
            .find_by_email(&principal.email)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        if !self.hasher.verify(current_password, &record.password_hash).await? {
            return Err(ValidationError::field(
                "current_password",
                "Current password is incorrect",
            )
            .into());
        }

        let password_hash = self.seal(new_password).await?;
        if !self.users.update_password_hash(id, &password_hash).await? {
            return Err(AuthError::PrincipalNotFound.into());
        }

        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    /// The single password write path
    async fn seal(&self, plaintext: &str) -> Result<PasswordHash, AppError> {
        self.hasher.hash(plaintext).await
    }
}

fn normalize(value: &str) -> String {
    value.to_lowercase()
}
