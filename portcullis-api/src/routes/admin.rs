//! Tenant administration endpoints
//!
//! Admin role required; authenticated members get a 403, which is the one
//! place the API distinguishes "who you are" failures from "what you may
//! do" failures. Both endpoints answer for the caller's own tenant only —
//! there is deliberately no way to enumerate other tenants.
//!
//! # Endpoints
//!
//! - `GET /api/v1/admin/tenant` - The caller's tenant record
//! - `GET /api/v1/admin/stats` - Usage counters for the caller's tenant

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Extension, Json};
use portcullis_core::auth::principal::Principal;
use portcullis_core::models::{Tenant, TenantStats};

/// Returns the caller's tenant record.
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
pub async fn tenant_info(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Tenant>> {
    principal.require_admin()?;

    let tenant = state
        .store
        .get_tenant(principal.tenant_id)
        .await?
        .ok_or_else(|| {
            // The principal was verified against this tenant moments ago;
            // its disappearance is a backend inconsistency, not a 404.
            tracing::error!(tenant_id = %principal.tenant_id, "Tenant record missing");
            ApiError::InternalError("Tenant record missing".to_string())
        })?;

    Ok(Json(tenant))
}

/// Returns usage counters for the caller's tenant.
///
/// # Response
///
/// ```json
/// {
///   "total_users": 12,
///   "active_users": 11,
///   "total_files": 40,
///   "total_storage_bytes": 10485760
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an admin
pub async fn tenant_stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<TenantStats>> {
    principal.require_admin()?;

    let stats = state.store.tenant_stats(principal.tenant_id).await?;

    Ok(Json(stats))
}
