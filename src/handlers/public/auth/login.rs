// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult, ValidJson};
use crate::services::users::{self, AuthSession, LoginRequest};
use crate::state::AppState;

/// POST /auth/login - exchange email and password for a bearer token
pub async fn login_post(State(state): State<AppState>, ValidJson(req): ValidJson<LoginRequest>) -> ApiResult<AuthSession> {
    let session = users::login(&state, req).await?;
    Ok(ApiResponse::success(session))
}
