// handlers/elevated/visa_types.rs - /admin/visa-types handlers

use axum::extract::State;
use axum::Extension;
use uuid::Uuid;

use crate::database::models::VisaType;
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidJson, ValidPath};
use crate::services::catalog::{self, VisaTypeInput, VisaTypeUpdate};
use crate::state::AppState;

/// GET /admin/visa-types - full catalog, inactive entries included
pub async fn list_get(State(state): State<AppState>) -> ApiResult<Vec<VisaType>> {
    Ok(ApiResponse::success(catalog::list_all(&state).await?))
}

/// POST /admin/visa-types
pub async fn create_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    ValidJson(input): ValidJson<VisaTypeInput>,
) -> ApiResult<VisaType> {
    Ok(ApiResponse::created(catalog::create(&state, &actor, input).await?))
}

/// PUT /admin/visa-types/:id - partial update; `is_active: false` retires an entry
pub async fn update_put(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(changes): ValidJson<VisaTypeUpdate>,
) -> ApiResult<VisaType> {
    Ok(ApiResponse::success(catalog::update(&state, &actor, id, changes).await?))
}
