use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::database::models::{Appointment, AppointmentFilter};
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::state::AppState;
use crate::types::AppointmentStatus;

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateAppointmentRequest {
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[validate(length(min = 2, max = 200))]
    pub location: String,
    #[validate(length(min = 2, max = 200))]
    pub purpose: String,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Query string for the admin listing
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppointmentQuery {
    pub user_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Only appointments from now on
    #[serde(default)]
    pub upcoming: bool,
}

pub async fn create(state: &AppState, actor: &Identity, req: CreateAppointmentRequest) -> Result<Appointment, ApiError> {
    if state.store.find_user(req.user_id).await?.is_none() {
        return Err(ApiError::field_error("user_id", "Unknown user"));
    }

    if let Some(application_id) = req.application_id {
        let application = state
            .store
            .find_application(application_id)
            .await?
            .ok_or_else(|| ApiError::field_error("application_id", "Unknown application"))?;
        if application.user_id != req.user_id {
            return Err(ApiError::field_error(
                "application_id",
                "Application belongs to a different user",
            ));
        }
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        user_id: req.user_id,
        application_id: req.application_id,
        scheduled_at: req.scheduled_at,
        location: req.location,
        purpose: req.purpose,
        status: AppointmentStatus::Scheduled,
        notes: req.notes,
        created_by: actor.id(),
        created_at: Utc::now(),
    };

    let appointment = state.store.insert_appointment(appointment).await?;
    info!(actor = %actor.id(), user_id = %appointment.user_id, at = %appointment.scheduled_at, "scheduled appointment");
    Ok(appointment)
}

pub async fn list_for_user(state: &AppState, identity: &Identity) -> Result<Vec<Appointment>, ApiError> {
    let filter = AppointmentFilter {
        user_id: Some(identity.id()),
        ..AppointmentFilter::default()
    };
    Ok(state.store.list_appointments(&filter).await?)
}

pub async fn list_all(state: &AppState, query: AppointmentQuery) -> Result<Vec<Appointment>, ApiError> {
    let filter = AppointmentFilter {
        user_id: query.user_id,
        status: query.status,
        from: query.upcoming.then(Utc::now),
    };
    Ok(state.store.list_appointments(&filter).await?)
}
