use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::types::{ApplicationStatus, UnknownVariant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "passport_outlives_birth", skip_on_field_errors = true))]
pub struct PersonalInfo {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[validate(length(min = 2, max = 64))]
    pub nationality: String,
    #[validate(length(min = 5, max = 20, message = "Passport number must be 5 to 20 characters long."))]
    pub passport_number: String,
    pub passport_expiry: NaiveDate,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "departure_after_arrival", skip_on_field_errors = true))]
pub struct TravelInfo {
    #[validate(length(min = 2, max = 200))]
    pub purpose: String,
    pub arrival_date: NaiveDate,
    pub departure_date: NaiveDate,
    #[validate(length(max = 255))]
    pub accommodation: Option<String>,
}

fn passport_outlives_birth(info: &PersonalInfo) -> Result<(), ValidationError> {
    if info.passport_expiry <= info.date_of_birth {
        return Err(ValidationError::new("passport_expiry")
            .with_message("Passport expiry must be after the date of birth.".into()));
    }
    Ok(())
}

fn departure_after_arrival(info: &TravelInfo) -> Result<(), ValidationError> {
    if info.departure_date < info.arrival_date {
        return Err(ValidationError::new("departure_date")
            .with_message("Departure cannot be before arrival.".into()));
    }
    Ok(())
}

/// Applicant document, referenced by the upload's generated name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ApplicationDocument {
    #[validate(length(min = 1, max = 64))]
    pub document_type: String,
    #[validate(length(min = 1, max = 128))]
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Shipping {
    #[validate(length(min = 1, max = 64))]
    pub method: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// Payment stub. Stored for display, never processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub currency: String,
    pub method: Option<String>,
    pub status: PaymentStatus,
    pub reference: Option<String>,
}

/// Fields the owner edits while the application is a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationContent {
    pub personal_info: PersonalInfo,
    pub travel_info: TravelInfo,
    pub documents: Vec<ApplicationDocument>,
    pub shipping: Option<Shipping>,
    pub payment: Option<Payment>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: ApplicationStatus,
    pub recorded_at: DateTime<Utc>,
    pub note: Option<String>,
    pub actor_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub application_number: String,
    pub user_id: Uuid,
    pub visa_type_id: Uuid,
    #[serde(flatten)]
    pub content: ApplicationContent,
    pub status: ApplicationStatus,
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// A fresh draft whose history opens with the `draft` entry
    pub fn new_draft(
        application_number: String,
        user_id: Uuid,
        visa_type_id: Uuid,
        content: ApplicationContent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_number,
            user_id,
            visa_type_id,
            content,
            status: ApplicationStatus::Draft,
            status_history: vec![StatusEntry {
                status: ApplicationStatus::Draft,
                recorded_at: now,
                note: None,
                actor_id: user_id,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a history entry and move `status` with it.
    ///
    /// Timestamps never go backwards within one application's history, so an
    /// entry stamped earlier than the current tail is clamped to the tail.
    pub fn record_status(&mut self, mut entry: StatusEntry) -> &StatusEntry {
        if let Some(last) = self.status_history.last() {
            if entry.recorded_at < last.recorded_at {
                entry.recorded_at = last.recorded_at;
            }
        }
        self.status = entry.status;
        self.updated_at = entry.recorded_at;
        self.status_history.push(entry);
        &self.status_history[self.status_history.len() - 1]
    }

    /// `status` equals the status of the newest history entry
    pub fn is_consistent(&self) -> bool {
        self.status_history
            .last()
            .map_or(false, |last| last.status == self.status)
    }
}

/// `VA` + year + six-digit sequence, e.g. `VA2026000042`
pub fn format_application_number(year: i32, sequence: u64) -> String {
    format!("VA{}{:06}", year, sequence)
}

pub fn application_number_for(now: DateTime<Utc>, sequence: u64) -> String {
    format_application_number(now.year(), sequence)
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
}

impl ApplicationFilter {
    pub fn matches(&self, app: &Application) -> bool {
        self.user_id.map_or(true, |id| app.user_id == id)
            && self.status.map_or(true, |s| app.status == s)
    }
}

/// Row shape of the `applications` table (history is loaded separately)
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub application_number: String,
    pub user_id: Uuid,
    pub visa_type_id: Uuid,
    pub personal_info: Json<PersonalInfo>,
    pub travel_info: Json<TravelInfo>,
    pub documents: Json<Vec<ApplicationDocument>>,
    pub shipping: Option<Json<Shipping>>,
    pub payment: Option<Json<Payment>>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape of the `application_status_history` table
#[derive(Debug, Clone, FromRow)]
pub struct StatusEntryRow {
    pub application_id: Uuid,
    pub status: String,
    pub note: Option<String>,
    pub actor_id: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl TryFrom<StatusEntryRow> for StatusEntry {
    type Error = UnknownVariant;

    fn try_from(row: StatusEntryRow) -> Result<Self, Self::Error> {
        Ok(StatusEntry {
            status: row.status.parse()?,
            recorded_at: row.recorded_at,
            note: row.note,
            actor_id: row.actor_id,
        })
    }
}

impl ApplicationRow {
    pub fn into_application(self, history: Vec<StatusEntry>) -> Result<Application, UnknownVariant> {
        Ok(Application {
            id: self.id,
            application_number: self.application_number,
            user_id: self.user_id,
            visa_type_id: self.visa_type_id,
            content: ApplicationContent {
                personal_info: self.personal_info.0,
                travel_info: self.travel_info.0,
                documents: self.documents.0,
                shipping: self.shipping.map(|s| s.0),
                payment: self.payment.map(|p| p.0),
                notes: self.notes,
            },
            status: self.status.parse()?,
            status_history: history,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_content() -> ApplicationContent {
    ApplicationContent {
        personal_info: PersonalInfo {
            first_name: "Alice".to_string(),
            last_name: "Martin".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
            nationality: "Canadian".to_string(),
            passport_number: "AB123456".to_string(),
            passport_expiry: NaiveDate::from_ymd_opt(2031, 1, 1).unwrap(),
            email: "alice@example.com".to_string(),
            phone: None,
        },
        travel_info: TravelInfo {
            purpose: "Holiday".to_string(),
            arrival_date: NaiveDate::from_ymd_opt(2027, 6, 1).unwrap(),
            departure_date: NaiveDate::from_ymd_opt(2027, 6, 20).unwrap(),
            accommodation: Some("Hotel Lutetia, Paris".to_string()),
        },
        documents: vec![],
        shipping: None,
        payment: None,
        notes: None,
    }
}
