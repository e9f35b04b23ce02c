// handlers/elevated/users.rs - /admin/users handlers

use axum::extract::State;
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{User, UserFilter};
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidJson, ValidPath, ValidQuery};
use crate::services::users::{self, AdminUserUpdate};
use crate::state::AppState;
use crate::types::Role;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// GET /admin/users?role=&is_active=
pub async fn list_get(State(state): State<AppState>, ValidQuery(query): ValidQuery<UserListQuery>) -> ApiResult<Vec<User>> {
    let filter = UserFilter {
        role: query.role,
        is_active: query.is_active,
    };
    Ok(ApiResponse::success(users::list_users(&state, filter).await?))
}

/// PUT /admin/users/:id - role, activation and name
pub async fn update_put(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<AdminUserUpdate>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(users::admin_update(&state, &actor, id, req).await?))
}
