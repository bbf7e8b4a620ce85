/// Persistence interface
///
/// The credential layer and the link routes only talk to these traits.
/// Uniqueness of handle and email is enforced by the implementation, not
/// by callers: `UserStore::insert` must report a collision as
/// `StoreError::UniqueViolation` even when the caller's existence check
/// raced with another insert.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{NewUser, PasswordHash, Principal, UserRecord};
use crate::error::UniqueField;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    UniqueViolation(UniqueField),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Single existence query over both unique fields. Inputs are normalized.
    async fn find_by_handle_or_email(
        &self,
        handle: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError>;

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    /// Public projection only; the hash column is never read.
    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    async fn find_principal_by_handle(&self, handle: &str)
        -> Result<Option<Principal>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Returns false when no such user exists.
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &PasswordHash,
    ) -> Result<bool, StoreError>;
}

/// A link in a principal's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub owner_id: Uuid,
    pub title: String,
    pub url: String,
    #[serde(rename = "order")]
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub owner_id: Uuid,
    pub title: String,
    pub url: String,
    pub position: i32,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct LinkChanges {
    pub title: Option<String>,
    pub url: Option<String>,
    pub position: Option<i32>,
}

/// Link storage. Every operation is scoped by owner id, so a link that
/// belongs to someone else is indistinguishable from a missing one.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Ordered by position, then creation time.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Link>, StoreError>;

    async fn max_position(&self, owner_id: Uuid) -> Result<Option<i32>, StoreError>;

    async fn insert(&self, link: NewLink) -> Result<Link, StoreError>;

    async fn update_for_owner(
        &self,
        owner_id: Uuid,
        link_id: Uuid,
        changes: LinkChanges,
    ) -> Result<Option<Link>, StoreError>;

    async fn delete_for_owner(&self, owner_id: Uuid, link_id: Uuid) -> Result<bool, StoreError>;
}
