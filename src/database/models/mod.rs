pub mod application;
pub mod appointment;
pub mod upload;
pub mod user;
pub mod visa_type;

use serde::Serialize;
use std::collections::BTreeMap;

pub use application::{
    Application, ApplicationContent, ApplicationDocument, ApplicationFilter, Payment, PaymentStatus,
    PersonalInfo, Shipping, StatusEntry, TravelInfo,
};
pub use appointment::{Appointment, AppointmentFilter};
pub use upload::UploadDescriptor;
pub use user::{NewUser, Profile, User, UserChanges, UserFilter};
pub use visa_type::{DetailedRequirement, FeeBreakdown, PdfRef, VisaType, VisaTypeQuery};

/// Aggregate counters for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub active_users: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub total_applications: i64,
    pub applications_by_status: BTreeMap<String, i64>,
    pub active_visa_types: i64,
    pub upcoming_appointments: i64,
}
