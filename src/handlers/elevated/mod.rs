// handlers/elevated/mod.rs - Admin console handlers
//
// Security Level: admin role on the stored user record
// Middleware: require_admin (route layer), which also rejects inactive accounts

pub mod applications;
pub mod appointments;
pub mod dashboard;
pub mod uploads;
pub mod users;
pub mod visa_types;
