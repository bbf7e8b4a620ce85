use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgDatabaseError;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Link, LinkChanges, LinkStore, NewLink, StoreError, UserStore};
use crate::auth::{NewUser, PasswordHash, Principal, UserRecord};
use crate::error::UniqueField;

const UNIQUE_VIOLATION: &str = "23505";
const HANDLE_CONSTRAINT: &str = "users_handle_key";

/// PostgreSQL-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    handle: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            handle: row.handle,
            email: row.email,
            password_hash: PasswordHash::from_stored(row.password_hash),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    handle: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            handle: row.handle,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    url: String,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            url: row.url,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Which identity column a violated unique constraint protects
fn unique_field_for(constraint: Option<&str>) -> UniqueField {
    match constraint {
        Some(HANDLE_CONSTRAINT) => UniqueField::Handle,
        _ => UniqueField::Email,
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.constraint());
            return StoreError::UniqueViolation(unique_field_for(constraint));
        }
    }
    backend(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_handle_or_email(
        &self,
        handle: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, handle, email, password_hash, created_at, updated_at
            FROM users
            WHERE handle = $1 OR email = $2
            ORDER BY (handle = $1) DESC
            LIMIT 1
            "#,
        )
        .bind(handle)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(UserRecord::from))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, handle, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING id, handle, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.handle)
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(row.into())
    }

    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, handle, email, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Principal::from))
    }

    async fn find_principal_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, handle, email, created_at, updated_at FROM users WHERE handle = $1",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, handle, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(UserRecord::from))
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &PasswordHash,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(password_hash.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LinkStore for PgStore {
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Link>, StoreError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, owner_id, title, url, position, created_at, updated_at
            FROM links
            WHERE owner_id = $1
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn max_position(&self, owner_id: Uuid) -> Result<Option<i32>, StoreError> {
        sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(position) FROM links WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)
    }

    async fn insert(&self, link: NewLink) -> Result<Link, StoreError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            INSERT INTO links (id, owner_id, title, url, position, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, owner_id, title, url, position, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(link.owner_id)
        .bind(&link.title)
        .bind(&link.url)
        .bind(link.position)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.into())
    }

    async fn update_for_owner(
        &self,
        owner_id: Uuid,
        link_id: Uuid,
        changes: LinkChanges,
    ) -> Result<Option<Link>, StoreError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            UPDATE links
            SET title = COALESCE($1, title),
                url = COALESCE($2, url),
                position = COALESCE($3, position),
                updated_at = $4
            WHERE id = $5 AND owner_id = $6
            RETURNING id, owner_id, title, url, position, created_at, updated_at
            "#,
        )
        .bind(changes.title)
        .bind(changes.url)
        .bind(changes.position)
        .bind(Utc::now())
        .bind(link_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(Link::from))
    }

    async fn delete_for_owner(&self, owner_id: Uuid, link_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM links WHERE id = $1 AND owner_id = $2")
            .bind(link_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected() == 1)
    }
}
