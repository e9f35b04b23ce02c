// handlers/protected/applications.rs - /applications handlers

use axum::extract::State;
use axum::Extension;
use uuid::Uuid;

use crate::database::models::Application;
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidJson, ValidJsonOrDefault, ValidPath};
use crate::services::applications::{self, CreateApplicationRequest, SubmitRequest, UpdateApplicationRequest};
use crate::state::AppState;

/// POST /applications - create a draft (or submit straight away with `submit: true`)
pub async fn create_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(req): ValidJson<CreateApplicationRequest>,
) -> ApiResult<Application> {
    let app = applications::create(&state, &identity, req).await?;
    Ok(ApiResponse::created(app))
}

/// GET /applications/user - the caller's applications, newest first
pub async fn user_list_get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Application>> {
    Ok(ApiResponse::success(applications::list_for_user(&state, &identity).await?))
}

/// GET /applications/:id - owner or admin
pub async fn show_get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Application> {
    Ok(ApiResponse::success(applications::get(&state, &identity, id).await?))
}

/// PUT /applications/:id - replace the editable blocks of a draft
pub async fn update_put(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<UpdateApplicationRequest>,
) -> ApiResult<Application> {
    Ok(ApiResponse::success(applications::update_draft(&state, &identity, id, req).await?))
}

/// POST /applications/:id/submit - draft → submitted
pub async fn submit_post(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJsonOrDefault(req): ValidJsonOrDefault<SubmitRequest>,
) -> ApiResult<Application> {
    let app = applications::submit(&state, &identity, id, req).await?;
    Ok(ApiResponse::success(app).with_message("Application submitted"))
}
