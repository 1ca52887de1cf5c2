//! Credential and file storage.
//!
//! The enforcement core talks to persistence only through the traits here,
//! so the same authentication and isolation logic runs against the
//! in-memory backend (tests, local development) and Postgres. Every
//! operation that takes a `tenant_id` is scoped: an id owned by another
//! tenant behaves exactly like an unknown id.
//!
//! Wrap any backend in [`Bounded`] to put a deadline on each call; a
//! stalled backend then surfaces as [`StoreError::Timeout`] instead of a
//! hung request.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    CreateFile, CreateTenant, CreateUser, FileMetadata, Tenant, TenantStats, UpdateUser, User,
};

/// Errors surfaced by storage backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("tenant name is already taken")]
    DuplicateTenantName,
    #[error("username is already taken in this tenant")]
    DuplicateUsername,
    #[error("email is already registered in this tenant")]
    DuplicateEmail,
    #[error("store call exceeded its deadline")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether a retry could plausibly succeed. Login retries transient
    /// failures once; request-scoped lookups never retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Unavailable(_))
    }
}

/// 1-based page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.number - 1) * u64::from(self.size)
    }
}

/// One page of results plus the total matching count.
#[derive(Debug, Clone)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Tenant and user persistence behind the authentication flows.
///
/// Contract notes:
///
/// - Tenant names are unique case-insensitively across the system;
///   usernames and emails are unique per tenant among *active* users, so
///   deactivation frees them for reuse.
/// - `find_user_by_identifier` matches a username or email among active
///   users only. `get_user` returns deactivated users too; callers that
///   authenticate must check `is_active` themselves.
/// - `deactivate_user` is the only deletion; user rows are never removed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_tenant(&self, data: CreateTenant) -> Result<Tenant, StoreError>;

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError>;

    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError>;

    async fn create_user(&self, tenant_id: Uuid, data: CreateUser) -> Result<User, StoreError>;

    async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_identifier(
        &self,
        tenant_id: Uuid,
        identifier: &str,
    ) -> Result<Option<User>, StoreError>;

    async fn list_users(
        &self,
        tenant_id: Uuid,
        page: Page,
        active_only: bool,
    ) -> Result<PageResult<User>, StoreError>;

    async fn update_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        changes: UpdateUser,
    ) -> Result<Option<User>, StoreError>;

    async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn tenant_stats(&self, tenant_id: Uuid) -> Result<TenantStats, StoreError>;
}

/// File persistence.
///
/// `get_file` is deliberately unscoped: the caller checks tenant ownership
/// on the returned metadata. `list_files` and `delete_file` scope inside
/// the query instead. Either shape upholds the same rule — cross-tenant
/// access must be indistinguishable from absence.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save_file(&self, tenant_id: Uuid, data: CreateFile) -> Result<FileMetadata, StoreError>;

    async fn get_file(&self, file_id: Uuid) -> Result<Option<(FileMetadata, Bytes)>, StoreError>;

    async fn list_files(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> Result<PageResult<FileMetadata>, StoreError>;

    async fn delete_file(&self, tenant_id: Uuid, file_id: Uuid) -> Result<bool, StoreError>;
}

/// Deadline wrapper: every call on the inner store must complete within a
/// fixed duration or it becomes [`StoreError::Timeout`].
#[derive(Debug)]
pub struct Bounded<S> {
    inner: S,
    deadline: Duration,
}

impl<S> Bounded<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    async fn clamp<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl<S: CredentialStore> CredentialStore for Bounded<S> {
    async fn create_tenant(&self, data: CreateTenant) -> Result<Tenant, StoreError> {
        self.clamp(self.inner.create_tenant(data)).await
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        self.clamp(self.inner.get_tenant(tenant_id)).await
    }

    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        self.clamp(self.inner.find_tenant_by_name(name)).await
    }

    async fn create_user(&self, tenant_id: Uuid, data: CreateUser) -> Result<User, StoreError> {
        self.clamp(self.inner.create_user(tenant_id, data)).await
    }

    async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.clamp(self.inner.get_user(tenant_id, user_id)).await
    }

    async fn find_user_by_identifier(
        &self,
        tenant_id: Uuid,
        identifier: &str,
    ) -> Result<Option<User>, StoreError> {
        self.clamp(self.inner.find_user_by_identifier(tenant_id, identifier))
            .await
    }

    async fn list_users(
        &self,
        tenant_id: Uuid,
        page: Page,
        active_only: bool,
    ) -> Result<PageResult<User>, StoreError> {
        self.clamp(self.inner.list_users(tenant_id, page, active_only))
            .await
    }

    async fn update_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        changes: UpdateUser,
    ) -> Result<Option<User>, StoreError> {
        self.clamp(self.inner.update_user(tenant_id, user_id, changes))
            .await
    }

    async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.clamp(self.inner.deactivate_user(tenant_id, user_id)).await
    }

    async fn tenant_stats(&self, tenant_id: Uuid) -> Result<TenantStats, StoreError> {
        self.clamp(self.inner.tenant_stats(tenant_id)).await
    }
}

#[async_trait]
impl<S: FileStore> FileStore for Bounded<S> {
    async fn save_file(&self, tenant_id: Uuid, data: CreateFile) -> Result<FileMetadata, StoreError> {
        self.clamp(self.inner.save_file(tenant_id, data)).await
    }

    async fn get_file(&self, file_id: Uuid) -> Result<Option<(FileMetadata, Bytes)>, StoreError> {
        self.clamp(self.inner.get_file(file_id)).await
    }

    async fn list_files(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> Result<PageResult<FileMetadata>, StoreError> {
        self.clamp(self.inner.list_files(tenant_id, page)).await
    }

    async fn delete_file(&self, tenant_id: Uuid, file_id: Uuid) -> Result<bool, StoreError> {
        self.clamp(self.inner.delete_file(tenant_id, file_id)).await
    }
}
