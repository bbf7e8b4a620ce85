use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Link, LinkChanges, LinkStore, NewLink, StoreError, UserStore};
use crate::auth::{NewUser, PasswordHash, Principal, UserRecord};
use crate::error::UniqueField;

/// In-process store for tests and database-less runs.
///
/// Each trait method takes the lock once and releases it before
/// returning, so an insert is atomic with its uniqueness check the way a
/// unique index is, while `find_by_handle_or_email` followed by `insert`
/// stays racy exactly like it is against Postgres.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, UserRecord>,
    links: HashMap<Uuid, Link>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Number of stored users
    pub fn user_count(&self) -> usize {
        self.state().map(|state| state.users.len()).unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_handle_or_email(
        &self,
        handle: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state()?;
        // Handle match wins when handle and email hit different users
        let by_handle = state.users.values().find(|user| user.handle == handle);
        Ok(by_handle
            .or_else(|| state.users.values().find(|user| user.email == email))
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut state = self.state()?;

        if state.users.values().any(|u| u.handle == user.handle) {
            return Err(StoreError::UniqueViolation(UniqueField::Handle));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(UniqueField::Email));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            handle: user.handle,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        let state = self.state()?;
        Ok(state.users.get(&id).cloned().map(UserRecord::into_principal))
    }

    async fn find_principal_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let state = self.state()?;
        Ok(state
            .users
            .values()
            .find(|user| user.handle == handle)
            .cloned()
            .map(UserRecord::into_principal))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let state = self.state()?;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &PasswordHash,
    ) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        match state.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.clone();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Link>, StoreError> {
        let state = self.state()?;
        let mut links: Vec<Link> = state
            .links
            .values()
            .filter(|link| link.owner_id == owner_id)
            .cloned()
            .collect();
        links.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(links)
    }

    async fn max_position(&self, owner_id: Uuid) -> Result<Option<i32>, StoreError> {
        let state = self.state()?;
        Ok(state
            .links
            .values()
            .filter(|link| link.owner_id == owner_id)
            .map(|link| link.position)
            .max())
    }

    async fn insert(&self, link: NewLink) -> Result<Link, StoreError> {
        let mut state = self.state()?;
        if !state.users.contains_key(&link.owner_id) {
            return Err(StoreError::Backend(format!(
                "foreign key violation: owner {} does not exist",
                link.owner_id
            )));
        }

        let now = Utc::now();
        let link = Link {
            id: Uuid::new_v4(),
            owner_id: link.owner_id,
            title: link.title,
            url: link.url,
            position: link.position,
            created_at: now,
            updated_at: now,
        };
        state.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn update_for_owner(
        &self,
        owner_id: Uuid,
        link_id: Uuid,
        changes: LinkChanges,
    ) -> Result<Option<Link>, StoreError> {
        let mut state = self.state()?;
        let link = match state.links.get_mut(&link_id) {
            Some(link) if link.owner_id == owner_id => link,
            _ => return Ok(None),
        };

        if let Some(title) = changes.title {
            link.title = title;
        }
        if let Some(url) = changes.url {
            link.url = url;
        }
        if let Some(position) = changes.position {
            link.position = position;
        }
        link.updated_at = Utc::now();
        Ok(Some(link.clone()))
    }

    async fn delete_for_owner(&self, owner_id: Uuid, link_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        match state.links.get(&link_id) {
            Some(link) if link.owner_id == owner_id => {
                state.links.remove(&link_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
