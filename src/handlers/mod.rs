// handlers/mod.rs - 3-tier handler layout
//
// Public (no auth, or optional identity on the catalog) → Protected (bearer
// token, any active account) → Elevated (bearer token, admin role).
// The gate for each tier is applied as a route layer in router.rs.

pub mod elevated;
pub mod protected;
pub mod public;
