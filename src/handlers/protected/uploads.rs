// handlers/protected/uploads.rs - /uploads handlers for signed-in users

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use crate::database::models::UploadDescriptor;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidPath};
use crate::services::uploads;
use crate::state::AppState;

/// POST /uploads/document - multipart, one file part (image or PDF)
pub async fn document_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<UploadDescriptor> {
    let form = uploads::read_form(multipart, state.uploads.max_file_bytes()).await?;
    let stored = uploads::upload_document(&state, &identity, form).await?;
    Ok(ApiResponse::created(stored))
}

/// GET /uploads/download/:filename - raw file bytes
pub async fn download_get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidPath(filename): ValidPath<String>,
) -> Result<Response, ApiError> {
    let (upload, bytes) = uploads::open(&state, &identity, &filename).await?;

    let content_type = HeaderValue::from_str(&upload.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe_filename(&upload.original_name)))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response())
}

/// DELETE /uploads/:filename - owner or admin
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidPath(filename): ValidPath<String>,
) -> ApiResult<()> {
    uploads::delete(&state, &identity, &filename).await?;
    Ok(ApiResponse::no_content())
}

// header-safe: printable ASCII minus quotes and backslashes
fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect()
}
