//! User management endpoints
//!
//! All operations are scoped to the caller's tenant: the tenant id comes
//! from the verified [`Principal`], never from the request. A user that
//! exists under another tenant is indistinguishable from one that does not
//! exist.
//!
//! # Endpoints
//!
//! - `GET /api/v1/users` - List users (paginated)
//! - `POST /api/v1/users` - Create a user
//! - `POST /api/v1/users/bulk` - Create up to 50 users concurrently
//! - `GET /api/v1/users/{user_id}` - Fetch a user
//! - `PUT /api/v1/users/{user_id}` - Update email / display name
//! - `DELETE /api/v1/users/{user_id}` - Deactivate (soft delete)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    pagination::{PageQuery, PaginatedResponse},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use futures::future;
use portcullis_core::auth::password;
use portcullis_core::auth::principal::Principal;
use portcullis_core::models::{CreateUser, Role, UpdateUser, User};
use portcullis_core::store::StoreError;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Upper bound on one bulk creation request.
const BULK_CREATE_LIMIT: usize = 50;

/// Query parameters for the user list
#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,

    /// When omitted, deactivated users are hidden
    pub active_only: Option<bool>,
}

/// User creation request (single and bulk)
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    /// Username (unique within the tenant)
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    /// Email address (unique within the tenant)
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: String,

    /// Role, defaulting to member
    pub role: Option<Role>,

    /// Initial password. When omitted, a random temporary password is set;
    /// it is never echoed back, so delivery is out of band.
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}

/// User update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub full_name: Option<String>,
}

/// Lists users in the caller's tenant, paginated.
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/users?page=1&page_size=20&active_only=true
/// ```
pub async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<PaginatedResponse<User>>> {
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(state.config.pagination);
    let active_only = query.active_only.unwrap_or(true);

    let result = state
        .store
        .list_users(principal.tenant_id, page, active_only)
        .await?;

    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Creates a user in the caller's tenant.
///
/// # Errors
///
/// - `409 Conflict`: Username or email already taken in this tenant
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;

    let user = insert_user(&state, principal.tenant_id, req).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Creates up to [`BULK_CREATE_LIMIT`] users concurrently.
///
/// All creations run at once; the first failure aborts the request and the
/// remaining creations are dropped. Users already written by sibling
/// creations stay written, so a 409 response does not mean nothing
/// happened.
///
/// # Errors
///
/// - `400 Bad Request`: More than 50 users in one request
/// - `409 Conflict`: A username or email in the batch is already taken
/// - `422 Unprocessable Entity`: Validation failed for any entry
pub async fn bulk_create_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(requests): Json<Vec<CreateUserRequest>>,
) -> ApiResult<(StatusCode, Json<Vec<User>>)> {
    if requests.len() > BULK_CREATE_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "Cannot create more than {} users at once",
            BULK_CREATE_LIMIT
        )));
    }
    for request in &requests {
        request.validate()?;
    }

    let creations = requests
        .into_iter()
        .map(|request| insert_user(&state, principal.tenant_id, request));
    let created = future::try_join_all(creations).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Fetches one user from the caller's tenant.
///
/// # Errors
///
/// - `404 Not Found`: No such user in this tenant (including users that
///   exist under another tenant)
pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = state
        .store
        .get_user(principal.tenant_id, user_id)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;

    Ok(Json(user))
}

/// Updates a user's email and/or display name.
///
/// # Errors
///
/// - `404 Not Found`: No such user in this tenant
/// - `409 Conflict`: New email already taken in this tenant
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let updated = state
        .store
        .update_user(
            principal.tenant_id,
            user_id,
            UpdateUser {
                email: req.email.clone(),
                full_name: req.full_name,
            },
        )
        .await
        .map_err(|err| match err {
            StoreError::DuplicateEmail => ApiError::Conflict(format!(
                "Email '{}' already exists",
                req.email.as_deref().unwrap_or_default()
            )),
            other => other.into(),
        })?
        .ok_or_else(|| user_not_found(user_id))?;

    Ok(Json(updated))
}

/// Deactivates a user (soft delete).
///
/// Idempotent for existing users; deactivating an already-inactive user
/// answers 204 again.
///
/// # Errors
///
/// - `404 Not Found`: No such user in this tenant
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state
        .store
        .deactivate_user(principal.tenant_id, user_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(user_not_found(user_id))
    }
}

/// Hashes the password (given or generated) and writes the user, mapping
/// duplicate errors to 409s that name the offending value.
async fn insert_user(
    state: &AppState,
    tenant_id: Uuid,
    req: CreateUserRequest,
) -> Result<User, ApiError> {
    let password_hash = match &req.password {
        Some(password) => password::hash_password(password)?,
        None => password::hash_password(&password::generate_temporary())?,
    };

    state
        .store
        .create_user(
            tenant_id,
            CreateUser {
                username: req.username.clone(),
                email: req.email.clone(),
                full_name: req.full_name.clone(),
                password_hash,
                role: req.role.unwrap_or(Role::Member),
            },
        )
        .await
        .map_err(|err| match err {
            StoreError::DuplicateUsername => {
                ApiError::Conflict(format!("Username '{}' already exists", req.username))
            }
            StoreError::DuplicateEmail => {
                ApiError::Conflict(format!("Email '{}' already exists", req.email))
            }
            other => other.into(),
        })
}

fn user_not_found(user_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("User with id '{}' not found", user_id))
}
