// handlers/protected/auth/mod.rs - Account handlers for signed-in users

pub mod profile; // PUT /auth/profile - edit own profile
pub mod whoami;  // GET /auth/me - current account

pub use profile::profile_put;
pub use whoami::me_get;
