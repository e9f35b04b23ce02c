// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// Routes here sit behind `require_user`, which puts the verified `Identity`
// into request extensions. Ownership checks happen in the services.

pub mod applications;
pub mod appointments;
pub mod auth;
pub mod uploads;
