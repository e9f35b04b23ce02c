// handlers/protected/appointments.rs - GET /appointments handler

use axum::{extract::State, Extension};

use crate::database::models::Appointment;
use crate::middleware::{ApiResponse, ApiResult, Identity};
use crate::services::appointments;
use crate::state::AppState;

/// GET /appointments - the caller's own appointments, soonest first
pub async fn list_get(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Appointment>> {
    Ok(ApiResponse::success(appointments::list_for_user(&state, &identity).await?))
}
