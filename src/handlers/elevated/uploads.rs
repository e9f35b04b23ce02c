// handlers/elevated/uploads.rs - POST /uploads/requirements handler

use axum::extract::{Multipart, State};
use axum::Extension;

use crate::database::models::VisaType;
use crate::middleware::{ApiResponse, ApiResult, Identity};
use crate::services::uploads;
use crate::state::AppState;

/// POST /uploads/requirements - multipart with a `visa_type_id` field and one
/// or more PDF parts, attached to the visa type's file list
pub async fn requirements_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<VisaType> {
    let form = uploads::read_form(multipart, state.uploads.max_file_bytes()).await?;
    let entry = uploads::upload_requirements(&state, &actor, form).await?;
    Ok(ApiResponse::created(entry))
}
