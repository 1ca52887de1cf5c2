//! Tenant-scope enforcement.
//!
//! Every resource access must prove the resource belongs to the caller's
//! tenant. A resource that exists but belongs elsewhere is reported exactly
//! like one that does not exist, so responses cannot confirm foreign ids.

use uuid::Uuid;

use crate::auth::principal::{AccessError, Principal};

/// Check that a resource's owning tenant matches the caller's.
pub fn enforce_scope(principal: &Principal, resource_tenant_id: Uuid) -> Result<(), AccessError> {
    if resource_tenant_id == principal.tenant_id {
        Ok(())
    } else {
        Err(AccessError::NotFound)
    }
}

/// Unwrap an optional lookup result, requiring the caller's tenant to own
/// it. Absent and foreign-owned collapse into the same `NotFound`.
pub fn scoped<T>(
    principal: &Principal,
    resource: Option<T>,
    tenant_of: impl Fn(&T) -> Uuid,
) -> Result<T, AccessError> {
    match resource {
        Some(found) => {
            enforce_scope(principal, tenant_of(&found))?;
            Ok(found)
        }
        None => Err(AccessError::NotFound),
    }
}
