// handlers/elevated/applications.rs - admin application handlers

use axum::extract::State;
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{Application, ApplicationFilter};
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidJson, ValidPath, ValidQuery};
use crate::services::applications::{self, StatusUpdateRequest};
use crate::state::AppState;
use crate::types::ApplicationStatus;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ApplicationListQuery {
    pub status: Option<ApplicationStatus>,
    pub user_id: Option<Uuid>,
}

/// GET /admin/applications?status=&user_id=
pub async fn list_get(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ApplicationListQuery>,
) -> ApiResult<Vec<Application>> {
    let filter = ApplicationFilter {
        user_id: query.user_id,
        status: query.status,
    };
    Ok(ApiResponse::success(applications::list_all(&state, filter).await?))
}

/// PUT /applications/:id/status - any status; always appends a history entry
pub async fn status_put(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<StatusUpdateRequest>,
) -> ApiResult<Application> {
    Ok(ApiResponse::success(applications::admin_update_status(&state, &actor, id, req).await?))
}
