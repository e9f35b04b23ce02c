// handlers/public/auth/register.rs - POST /auth/register handler

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult, ValidJson};
use crate::services::users::{self, AuthSession, RegisterRequest};
use crate::state::AppState;

/// POST /auth/register - create an account and sign it in.
///
/// New accounts always start as `non-subscriber`; the body cannot carry a role.
pub async fn register_post(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> ApiResult<AuthSession> {
    let session = users::register(&state, req).await?;
    Ok(ApiResponse::created(session).with_message("Registration successful"))
}
