// handlers/public/auth/mod.rs - Public authentication handlers

pub mod login;    // POST /auth/login - authenticate and get a bearer token
pub mod register; // POST /auth/register - create a non-subscriber account

pub use login::login_post;
pub use register::register_post;
