//! Tenant file storage endpoints
//!
//! Uploads land in the file store keyed by tenant; downloads and deletes
//! are tenant-scoped the same way the user endpoints are, so a file owned
//! by another tenant answers exactly like a missing one.
//!
//! # Endpoints
//!
//! - `POST /api/v1/files/upload` - Upload a file (multipart, field `file`)
//! - `GET /api/v1/files` - List files (paginated)
//! - `GET /api/v1/files/{file_id}` - Download
//! - `DELETE /api/v1/files/{file_id}` - Delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    pagination::{PageQuery, PaginatedResponse},
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use portcullis_core::auth::principal::Principal;
use portcullis_core::models::{CreateFile, FileMetadata};
use portcullis_core::scope;
use uuid::Uuid;

/// Uploads one file into the caller's tenant.
///
/// Expects a multipart body with a `file` field. The content type is
/// checked against the configured allowlist before the body is read, so
/// disallowed types are rejected without buffering the upload.
///
/// # Errors
///
/// - `400 Bad Request`: No `file` field, or no filename on it
/// - `413 Payload Too Large`: File exceeds the configured size limit
/// - `415 Unsupported Media Type`: Content type outside the allowlist
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FileMetadata>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Uploaded file must have a filename".to_string()))?;
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        if !state
            .config
            .uploads
            .allowed_file_types
            .contains(&content_type.to_ascii_lowercase())
        {
            return Err(ApiError::UnsupportedMediaType(format!(
                "File type '{}' not allowed",
                content_type
            )));
        }

        let content = field.bytes().await?;
        if content.len() > state.config.max_upload_bytes() {
            let size_mb = content.len() as f64 / (1024.0 * 1024.0);
            return Err(ApiError::PayloadTooLarge(format!(
                "File size {:.2}MB exceeds limit of {}MB",
                size_mb, state.config.uploads.max_file_size_mb
            )));
        }

        let metadata = state
            .files
            .save_file(
                principal.tenant_id,
                CreateFile {
                    filename,
                    content_type,
                    uploaded_by: principal.user_id,
                    content,
                },
            )
            .await?;

        return Ok((StatusCode::CREATED, Json(metadata)));
    }

    Err(ApiError::BadRequest(
        "Expected a 'file' field in the multipart body".to_string(),
    ))
}

/// Lists files in the caller's tenant, paginated.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PaginatedResponse<FileMetadata>>> {
    let page = query.resolve(state.config.pagination);
    let result = state.files.list_files(principal.tenant_id, page).await?;

    Ok(Json(PaginatedResponse::new(result, page)))
}

/// Downloads a file as an attachment.
///
/// The lookup itself is by id alone; ownership is enforced afterwards, and
/// a foreign-tenant file produces the same 404 as a missing id.
///
/// # Errors
///
/// - `404 Not Found`: No such file in this tenant
pub async fn download_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Response> {
    let found = state.files.get_file(file_id).await?;
    let (meta, content) = scope::scoped(&principal, found, |(meta, _)| meta.tenant_id)
        .map_err(|_| file_not_found(file_id))?;

    // Quotes would break out of the disposition parameter
    let disposition = format!(
        "attachment; filename=\"{}\"",
        meta.filename.replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, meta.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

/// Deletes a file from the caller's tenant.
///
/// # Errors
///
/// - `404 Not Found`: No such file in this tenant
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.files.delete_file(principal.tenant_id, file_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(file_not_found(file_id))
    }
}

fn file_not_found(file_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("File with id '{}' not found", file_id))
}
