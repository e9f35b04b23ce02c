// handlers/public/system.rs - GET / and GET /health handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use tracing::error;

use crate::state::AppState;

/// GET / - service description
pub async fn root_get() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Visa Portal API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Visa catalog, applications, uploads and admin console",
            "endpoints": {
                "auth": "/auth/register, /auth/login (public); /auth/me, /auth/profile (authenticated)",
                "visa": "/visa/countries, /visa/types/:country, /visa/requirements/:id, /visa/search, /visa/matrix (public, tiered by role)",
                "applications": "/applications[/:id] (authenticated, owner only)",
                "appointments": "/appointments (authenticated)",
                "uploads": "/uploads/document, /uploads/download/:filename, /uploads/:filename (authenticated)",
                "admin": "/admin/* (admin only)",
            }
        }
    }))
}

/// GET /health - liveness plus a store ping
pub async fn health_get(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": state.config.database.backend,
                }
            })),
        ),
        Err(e) => {
            error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": true,
                    "message": "Store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}
