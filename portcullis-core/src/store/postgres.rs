//! Postgres store backend.
//!
//! Uniqueness is enforced by the database: partial unique indexes on
//! `(tenant_id, username)` and `(tenant_id, LOWER(email))` over active rows,
//! and a unique index on `LOWER(name)` for tenants. Unique violations map
//! back to the corresponding [`StoreError`] duplicate variant by constraint
//! name. Table definitions live with the models; applying them is a
//! deployment concern.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, FileStore, Page, PageResult, StoreError};
use crate::models::{
    CreateFile, CreateTenant, CreateUser, FileMetadata, Tenant, TenantStats, UpdateUser, User,
};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool closed".to_string()),
            sqlx::Error::Io(io) => StoreError::Unavailable(io.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
                Some(c) if c.contains("username") => StoreError::DuplicateUsername,
                Some(c) if c.contains("email") => StoreError::DuplicateEmail,
                Some(c) if c.contains("name") => StoreError::DuplicateTenantName,
                _ => StoreError::Backend(db.to_string()),
            },
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn create_tenant(&self, data: CreateTenant) -> Result<Tenant, StoreError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(&data.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, created_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, created_at
            FROM tenants
            WHERE LOWER(name) = LOWER($1)
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn create_user(&self, tenant_id: Uuid, data: CreateUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (tenant_id, username, email, full_name, password_hash, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, username, email, full_name, password_hash,
                      role, is_active, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.full_name)
        .bind(&data.password_hash)
        .bind(data.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, tenant_id, username, email, full_name, password_hash,
                   role, is_active, created_at, updated_at
            FROM users
            WHERE id = $2 AND tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_identifier(
        &self,
        tenant_id: Uuid,
        identifier: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, tenant_id, username, email, full_name, password_hash,
                   role, is_active, created_at, updated_at
            FROM users
            WHERE tenant_id = $1
              AND is_active
              AND (username = $2 OR LOWER(email) = LOWER($2))
            "#,
        )
        .bind(tenant_id)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(
        &self,
        tenant_id: Uuid,
        page: Page,
        active_only: bool,
    ) -> Result<PageResult<User>, StoreError> {
        let items = sqlx::query_as::<_, User>(
            r#"
            SELECT id, tenant_id, username, email, full_name, password_hash,
                   role, is_active, created_at, updated_at
            FROM users
            WHERE tenant_id = $1 AND (NOT $2 OR is_active)
            ORDER BY created_at, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(active_only)
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE tenant_id = $1 AND (NOT $2 OR is_active)
            "#,
        )
        .bind(tenant_id)
        .bind(active_only)
        .fetch_one(&self.pool)
        .await?;

        Ok(PageResult {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn update_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        changes: UpdateUser,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($3, email),
                full_name = COALESCE($4, full_name),
                updated_at = NOW()
            WHERE id = $2 AND tenant_id = $1
            RETURNING id, tenant_id, username, email, full_name, password_hash,
                      role, is_active, created_at, updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(changes.email)
        .bind(changes.full_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_active = FALSE, updated_at = NOW()
            WHERE id = $2 AND tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn tenant_stats(&self, tenant_id: Uuid) -> Result<TenantStats, StoreError> {
        let stats = sqlx::query_as::<_, TenantStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE tenant_id = $1) AS total_users,
                (SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND is_active) AS active_users,
                (SELECT COUNT(*) FROM files WHERE tenant_id = $1) AS total_files,
                (SELECT COALESCE(SUM(size_bytes), 0)::BIGINT
                   FROM files WHERE tenant_id = $1) AS total_storage_bytes
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: Uuid,
    tenant_id: Uuid,
    filename: String,
    content_type: String,
    size_bytes: i64,
    uploaded_by: Uuid,
    uploaded_at: DateTime<Utc>,
    content: Vec<u8>,
}

impl FileRow {
    fn split(self) -> (FileMetadata, Bytes) {
        (
            FileMetadata {
                id: self.id,
                tenant_id: self.tenant_id,
                filename: self.filename,
                content_type: self.content_type,
                size_bytes: self.size_bytes,
                uploaded_by: self.uploaded_by,
                uploaded_at: self.uploaded_at,
            },
            Bytes::from(self.content),
        )
    }
}

#[async_trait]
impl FileStore for PostgresStore {
    async fn save_file(&self, tenant_id: Uuid, data: CreateFile) -> Result<FileMetadata, StoreError> {
        let meta = sqlx::query_as::<_, FileMetadata>(
            r#"
            INSERT INTO files (tenant_id, filename, content_type, size_bytes, uploaded_by, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, tenant_id, filename, content_type, size_bytes, uploaded_by, uploaded_at
            "#,
        )
        .bind(tenant_id)
        .bind(&data.filename)
        .bind(&data.content_type)
        .bind(data.content.len() as i64)
        .bind(data.uploaded_by)
        .bind(data.content.as_ref())
        .fetch_one(&self.pool)
        .await?;

        Ok(meta)
    }

    async fn get_file(&self, file_id: Uuid) -> Result<Option<(FileMetadata, Bytes)>, StoreError> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, tenant_id, filename, content_type, size_bytes,
                   uploaded_by, uploaded_at, content
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FileRow::split))
    }

    async fn list_files(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> Result<PageResult<FileMetadata>, StoreError> {
        let items = sqlx::query_as::<_, FileMetadata>(
            r#"
            SELECT id, tenant_id, filename, content_type, size_bytes, uploaded_by, uploaded_at
            FROM files
            WHERE tenant_id = $1
            ORDER BY uploaded_at, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id)
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM files WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PageResult {
            items,
            total: total.max(0) as u64,
        })
    }

    async fn delete_file(&self, tenant_id: Uuid, file_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM files
            WHERE id = $2 AND tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
