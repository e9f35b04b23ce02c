use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    Application, ApplicationContent, ApplicationFilter, Appointment, AppointmentFilter,
    DashboardStats, NewUser, PdfRef, StatusEntry, UploadDescriptor, User, UserChanges, UserFilter,
    VisaType, VisaTypeQuery,
};
use crate::types::ApplicationStatus;

pub type StoreResult<T> = Result<T, DatabaseError>;

/// Persistence seam shared by the Postgres and in-memory backends.
///
/// Every method is a single atomic unit: callers never need to compose two
/// calls to keep an entity consistent.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn close(&self);

    /// Fails with `Conflict` when the email is already registered
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// `email` must already be normalised to lower case
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;

    async fn insert_visa_type(&self, entry: VisaType) -> StoreResult<VisaType>;

    /// Overwrite every mutable column of an existing entry
    async fn replace_visa_type(&self, entry: VisaType) -> StoreResult<VisaType>;

    async fn append_visa_type_pdfs(
        &self,
        id: Uuid,
        pdfs: Vec<PdfRef>,
        actor: Uuid,
    ) -> StoreResult<VisaType>;

    async fn find_visa_type(&self, id: Uuid) -> StoreResult<Option<VisaType>>;

    /// Ordered by country, category, then name
    async fn list_visa_types(&self, query: &VisaTypeQuery) -> StoreResult<Vec<VisaType>>;

    /// Atomically increments and returns the application counter for `year`
    async fn next_application_sequence(&self, year: i32) -> StoreResult<u64>;

    /// Fails with `Conflict` when the application number is taken
    async fn insert_application(&self, application: Application) -> StoreResult<Application>;

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>>;

    /// Newest first
    async fn list_applications(&self, filter: &ApplicationFilter) -> StoreResult<Vec<Application>>;

    /// Replace the editable content while the status still equals `expected`
    async fn update_application_content(
        &self,
        id: Uuid,
        content: ApplicationContent,
        expected: ApplicationStatus,
    ) -> StoreResult<Application>;

    /// Append one history entry and set the status in the same unit of work.
    ///
    /// With `expected` set, the append only happens while the current status
    /// matches it; otherwise the call fails with `Conflict`.
    async fn append_status(
        &self,
        id: Uuid,
        entry: StatusEntry,
        expected: Option<ApplicationStatus>,
    ) -> StoreResult<Application>;

    async fn insert_upload(&self, upload: UploadDescriptor) -> StoreResult<UploadDescriptor>;

    async fn find_upload(&self, generated_name: &str) -> StoreResult<Option<UploadDescriptor>>;

    /// Drop a descriptor. Returns whether one was removed.
    ///
    /// A requirement file is detached from every visa type listing it in the
    /// same unit. A document referenced by a non-draft application is kept
    /// and the call fails with `Conflict`.
    async fn delete_upload(&self, generated_name: &str) -> StoreResult<bool>;

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment>;

    /// Soonest first
    async fn list_appointments(&self, filter: &AppointmentFilter) -> StoreResult<Vec<Appointment>>;

    async fn dashboard_stats(&self, now: DateTime<Utc>) -> StoreResult<DashboardStats>;
}
