pub mod auth;
pub mod response;
pub mod validate_json;

pub use auth::{identify, require_admin, require_user, Identity, Viewer};
pub use response::{ApiResponse, ApiResult};
pub use validate_json::{ValidJson, ValidJsonOrDefault, ValidPath, ValidQuery};
