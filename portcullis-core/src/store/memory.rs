//! In-memory store backend.
//!
//! Backs tests and `memory://` deployments. Data lives in sharded
//! concurrent maps; reads take no global lock. Writes that must uphold a
//! uniqueness rule (tenant names, per-tenant usernames and emails)
//! serialize on one mutex so the check and the insert cannot interleave.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CredentialStore, FileStore, Page, PageResult, StoreError};
use crate::models::{
    CreateFile, CreateTenant, CreateUser, FileMetadata, Tenant, TenantStats, UpdateUser, User,
};

/// Process-local implementation of both store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tenants: DashMap<Uuid, Tenant>,
    users: DashMap<Uuid, User>,
    files: DashMap<Uuid, FileMetadata>,
    contents: DashMap<Uuid, Bytes>,
    writes: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_tenant(&self, data: CreateTenant) -> Result<Tenant, StoreError> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);

        if self
            .tenants
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&data.name))
        {
            return Err(StoreError::DuplicateTenantName);
        }

        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: data.name,
            created_at: Utc::now(),
        };
        self.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>, StoreError> {
        Ok(self.tenants.get(&tenant_id).map(|t| t.value().clone()))
    }

    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>, StoreError> {
        Ok(self
            .tenants
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.value().clone()))
    }

    async fn create_user(&self, tenant_id: Uuid, data: CreateUser) -> Result<User, StoreError> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);

        for existing in self.users.iter() {
            if existing.tenant_id != tenant_id || !existing.is_active {
                continue;
            }
            if existing.username == data.username {
                return Err(StoreError::DuplicateUsername);
            }
            if existing.email.eq_ignore_ascii_case(&data.email) {
                return Err(StoreError::DuplicateEmail);
            }
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id,
            username: data.username,
            email: data.email,
            full_name: data.full_name,
            password_hash: data.password_hash,
            role: data.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .get(&user_id)
            .filter(|u| u.tenant_id == tenant_id)
            .map(|u| u.value().clone()))
    }

    async fn find_user_by_identifier(
        &self,
        tenant_id: Uuid,
        identifier: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|u| {
                u.tenant_id == tenant_id
                    && u.is_active
                    && (u.username == identifier || u.email.eq_ignore_ascii_case(identifier))
            })
            .map(|u| u.value().clone()))
    }

    async fn list_users(
        &self,
        tenant_id: Uuid,
        page: Page,
        active_only: bool,
    ) -> Result<PageResult<User>, StoreError> {
        let mut items: Vec<User> = self
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id && (!active_only || u.is_active))
            .map(|u| u.value().clone())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let total = items.len() as u64;
        let start = (page.offset() as usize).min(items.len());
        let end = (start + page.size as usize).min(items.len());

        Ok(PageResult {
            items: items[start..end].to_vec(),
            total,
        })
    }

    async fn update_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        changes: UpdateUser,
    ) -> Result<Option<User>, StoreError> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(new_email) = &changes.email {
            let taken = self.users.iter().any(|u| {
                u.tenant_id == tenant_id
                    && u.is_active
                    && u.id != user_id
                    && u.email.eq_ignore_ascii_case(new_email)
            });
            if taken {
                return Err(StoreError::DuplicateEmail);
            }
        }

        match self.users.get_mut(&user_id) {
            Some(mut entry) if entry.tenant_id == tenant_id => {
                if let Some(email) = changes.email {
                    entry.email = email;
                }
                if let Some(full_name) = changes.full_name {
                    entry.full_name = full_name;
                }
                entry.updated_at = Utc::now();
                Ok(Some(entry.value().clone()))
            }
            _ => Ok(None),
        }
    }

    async fn deactivate_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        match self.users.get_mut(&user_id) {
            Some(mut entry) if entry.tenant_id == tenant_id => {
                entry.is_active = false;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn tenant_stats(&self, tenant_id: Uuid) -> Result<TenantStats, StoreError> {
        let mut stats = TenantStats {
            total_users: 0,
            active_users: 0,
            total_files: 0,
            total_storage_bytes: 0,
        };

        for user in self.users.iter() {
            if user.tenant_id == tenant_id {
                stats.total_users += 1;
                if user.is_active {
                    stats.active_users += 1;
                }
            }
        }
        for file in self.files.iter() {
            if file.tenant_id == tenant_id {
                stats.total_files += 1;
                stats.total_storage_bytes += file.size_bytes;
            }
        }

        Ok(stats)
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn save_file(&self, tenant_id: Uuid, data: CreateFile) -> Result<FileMetadata, StoreError> {
        let meta = FileMetadata {
            id: Uuid::new_v4(),
            tenant_id,
            filename: data.filename,
            content_type: data.content_type,
            size_bytes: data.content.len() as i64,
            uploaded_by: data.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.contents.insert(meta.id, data.content);
        self.files.insert(meta.id, meta.clone());
        Ok(meta)
    }

    async fn get_file(&self, file_id: Uuid) -> Result<Option<(FileMetadata, Bytes)>, StoreError> {
        let meta = match self.files.get(&file_id) {
            Some(found) => found.value().clone(),
            None => return Ok(None),
        };
        let content = match self.contents.get(&file_id) {
            Some(found) => found.value().clone(),
            None => return Ok(None),
        };
        Ok(Some((meta, content)))
    }

    async fn list_files(
        &self,
        tenant_id: Uuid,
        page: Page,
    ) -> Result<PageResult<FileMetadata>, StoreError> {
        let mut items: Vec<FileMetadata> = self
            .files
            .iter()
            .filter(|f| f.tenant_id == tenant_id)
            .map(|f| f.value().clone())
            .collect();
        items.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at).then(a.id.cmp(&b.id)));

        let total = items.len() as u64;
        let start = (page.offset() as usize).min(items.len());
        let end = (start + page.size as usize).min(items.len());

        Ok(PageResult {
            items: items[start..end].to_vec(),
            total,
        })
    }

    async fn delete_file(&self, tenant_id: Uuid, file_id: Uuid) -> Result<bool, StoreError> {
        match self
            .files
            .remove_if(&file_id, |_, meta| meta.tenant_id == tenant_id)
        {
            Some(_) => {
                self.contents.remove(&file_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
