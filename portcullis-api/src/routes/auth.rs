//! Authentication endpoints
//!
//! This module provides the authentication endpoints:
//! - Tenant registration
//! - Login
//! - Token refresh
//! - Logout
//!
//! # Endpoints
//!
//! - `POST /auth/register` - Register a tenant with its first admin (public)
//! - `POST /auth/login` - Login and get a token pair (public)
//! - `POST /auth/refresh` - Trade a refresh token for a new pair (public)
//! - `POST /auth/logout` - Revoke a refresh token (authenticated)
//!
//! Login, refresh, and logout are thin wrappers over
//! [`SessionService`](portcullis_core::auth::session::SessionService); the
//! uniform 401 policy for bad credentials lives there and in the error
//! mapping, not here.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Json};
use portcullis_core::auth::password;
use portcullis_core::auth::principal::AccessError;
use portcullis_core::auth::token::TokenPair;
use portcullis_core::models::{CreateTenant, CreateUser, Role};
use portcullis_core::store::StoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tenant registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Name of the tenant to create (unique system-wide, case-insensitive)
    #[validate(length(min = 3, max = 50, message = "Tenant name must be 3-50 characters"))]
    pub tenant_name: String,

    /// Email address for the first admin user
    #[validate(email(message = "Invalid email format"))]
    pub admin_email: String,

    /// Username for the first admin user
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub admin_username: String,

    /// Password for the first admin user
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub admin_password: String,
}

/// Tenant registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Human-readable outcome
    pub message: String,

    /// ID of the new tenant
    pub tenant_id: Uuid,

    /// ID of the tenant's first admin user
    pub admin_user_id: Uuid,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Tenant name (case-insensitive)
    #[validate(length(min = 1, message = "Tenant name is required"))]
    pub tenant: String,

    /// Username or email address
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token from a previous login or refresh
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    /// Refresh token to revoke
    pub refresh_token: String,
}

/// Registers a new tenant with its first admin user.
///
/// # Endpoint
///
/// ```text
/// POST /auth/register
/// Content-Type: application/json
///
/// {
///   "tenant_name": "acme",
///   "admin_email": "alice@acme.example",
///   "admin_username": "alice",
///   "admin_password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Tenant name already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;

    // Hash before creating anything, so a hashing failure cannot leave a
    // tenant behind without a working admin.
    let password_hash = password::hash_password(&req.admin_password)?;

    let tenant = state
        .store
        .create_tenant(CreateTenant {
            name: req.tenant_name.clone(),
        })
        .await
        .map_err(|err| match err {
            StoreError::DuplicateTenantName => {
                ApiError::Conflict(format!("Tenant '{}' already exists", req.tenant_name))
            }
            other => other.into(),
        })?;

    // TODO: roll back the tenant if admin creation fails; needs a
    // transactional create on the store trait.
    let admin = state
        .store
        .create_user(
            tenant.id,
            CreateUser {
                username: req.admin_username,
                email: req.admin_email,
                full_name: "Admin User".to_string(),
                password_hash,
                role: Role::Admin,
            },
        )
        .await?;

    tracing::info!(
        tenant_id = %tenant.id,
        admin_user_id = %admin.id,
        "Tenant registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Tenant registered successfully".to_string(),
            tenant_id: tenant.id,
            admin_user_id: admin.id,
        }),
    ))
}

/// Authenticates a user and returns a token pair.
///
/// # Endpoint
///
/// ```text
/// POST /auth/login
/// Content-Type: application/json
///
/// {
///   "tenant": "acme",
///   "username": "alice",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown tenant, unknown user, wrong password, or
///   deactivated account. All four produce the same response.
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    req.validate()?;

    let pair = state
        .sessions
        .login(&req.tenant, &req.username, &req.password)
        .await
        .map_err(|err| match err {
            AccessError::Unauthenticated => {
                ApiError::Unauthorized("Invalid username or password".to_string())
            }
            other => other.into(),
        })?;

    Ok(Json(pair))
}

/// Trades a refresh token for a fresh token pair.
///
/// The presented refresh token is spent in the exchange; replaying it
/// afterwards fails.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired, revoked, or replayed token, or
///   the account was deactivated since issue.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let pair = state.sessions.refresh(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// Revokes a refresh token.
///
/// Requires a valid access token; the refresh token to revoke travels in
/// the body. Always answers 200: revoking an expired, garbage, or
/// already-revoked token is a no-op, and the response must not reveal
/// which it was.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.sessions.logout(&req.refresh_token);
    Ok(Json(MessageResponse::new("Logged out successfully")))
}
