// handlers/elevated/appointments.rs - /admin/appointments handlers

use axum::extract::State;
use axum::Extension;

use crate::database::models::Appointment;
use crate::middleware::{ApiResponse, ApiResult, Identity, ValidJson, ValidQuery};
use crate::services::appointments::{self, AppointmentQuery, CreateAppointmentRequest};
use crate::state::AppState;

/// GET /admin/appointments?user_id=&status=&upcoming=
pub async fn list_get(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AppointmentQuery>,
) -> ApiResult<Vec<Appointment>> {
    Ok(ApiResponse::success(appointments::list_all(&state, query).await?))
}

/// POST /admin/appointments
pub async fn create_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    ValidJson(req): ValidJson<CreateAppointmentRequest>,
) -> ApiResult<Appointment> {
    Ok(ApiResponse::created(appointments::create(&state, &actor, req).await?))
}
