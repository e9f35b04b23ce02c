// handlers/protected/auth/profile.rs - PUT /auth/profile handler

use axum::{extract::State, Extension};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidJson};
use crate::services::users::{self, ProfileUpdate};
use crate::state::AppState;

/// PUT /auth/profile - update name, contact details or password
pub async fn profile_put(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(req): ValidJson<ProfileUpdate>,
) -> ApiResult<User> {
    let user = users::update_profile(&state, &identity, req).await?;
    Ok(ApiResponse::success(user))
}
