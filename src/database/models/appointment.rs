use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::{AppointmentStatus, UnknownVariant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub location: String,
    pub purpose: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Only appointments scheduled at or after this instant
    pub from: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.user_id.map_or(true, |id| appointment.user_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
            && self.from.map_or(true, |from| appointment.scheduled_at >= from)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub location: String,
    pub purpose: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = UnknownVariant;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            user_id: row.user_id,
            application_id: row.application_id,
            scheduled_at: row.scheduled_at,
            location: row.location,
            purpose: row.purpose,
            status: row.status.parse()?,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}
