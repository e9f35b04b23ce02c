use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::AppConfig;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{identify, require_admin, require_user};
use crate::state::AppState;

/// The full HTTP surface
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .merge(public_routes())
        .merge(catalog_routes(&state))
        .merge(protected_routes(&state))
        .merge(elevated_routes(&state))
        .with_state(state)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.uploads.max_request_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router<AppState> {
    use public::{auth, system};

    Router::new()
        .route("/", get(system::root_get))
        .route("/health", get(system::health_get))
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
}

/// Anonymous access allowed; a token, when sent, must be valid
fn catalog_routes(state: &AppState) -> Router<AppState> {
    use public::visa;

    Router::new()
        .route("/visa/countries", get(visa::countries_get))
        .route("/visa/types/:country", get(visa::types_get))
        .route("/visa/requirements/:id", get(visa::requirements_get))
        .route("/visa/search", get(visa::search_get))
        .route("/visa/matrix", get(visa::matrix_get))
        .route_layer(from_fn_with_state(state.clone(), identify))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use protected::{applications, appointments, auth, uploads};

    Router::new()
        .route("/auth/me", get(auth::me_get))
        .route("/auth/profile", put(auth::profile_put))
        .route("/applications", post(applications::create_post))
        .route("/applications/user", get(applications::user_list_get))
        .route("/applications/:id", get(applications::show_get).put(applications::update_put))
        .route("/applications/:id/submit", post(applications::submit_post))
        .route("/appointments", get(appointments::list_get))
        .route("/uploads/document", post(uploads::document_post))
        .route("/uploads/download/:filename", get(uploads::download_get))
        .route("/uploads/:filename", delete(uploads::delete))
        .route_layer(from_fn_with_state(state.clone(), require_user))
}

fn elevated_routes(state: &AppState) -> Router<AppState> {
    use elevated::{applications, appointments, dashboard, uploads, users, visa_types};

    Router::new()
        .route("/applications/:id/status", put(applications::status_put))
        .route("/uploads/requirements", post(uploads::requirements_post))
        .route("/admin/dashboard", get(dashboard::dashboard_get))
        .route("/admin/users", get(users::list_get))
        .route("/admin/users/:id", put(users::update_put))
        .route("/admin/visa-types", get(visa_types::list_get).post(visa_types::create_post))
        .route("/admin/visa-types/:id", put(visa_types::update_put))
        .route("/admin/appointments", get(appointments::list_get).post(appointments::create_post))
        .route("/admin/applications", get(applications::list_get))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security = &config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if config.is_development() || security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
