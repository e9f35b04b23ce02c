// handlers/protected/auth/whoami.rs - GET /auth/me handler

use axum::Extension;

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, Identity};

/// GET /auth/me - the account behind the bearer token, as currently stored
pub async fn me_get(Extension(identity): Extension<Identity>) -> ApiResult<User> {
    Ok(ApiResponse::success(identity.user))
}
