// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition, service metadata and the visa catalog. Catalog routes
// run behind the `identify` layer: anonymous callers get the public tier,
// a valid token upgrades the response, an invalid token is rejected.

pub mod auth;
pub mod system;
pub mod visa;
