pub mod applications;
pub mod appointments;
pub mod bootstrap;
pub mod catalog;
pub mod uploads;
pub mod users;

pub use uploads::{UploadError, UploadStore};
