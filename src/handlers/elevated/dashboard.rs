// handlers/elevated/dashboard.rs - GET /admin/dashboard handler

use axum::extract::State;
use chrono::Utc;

use crate::database::models::DashboardStats;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /admin/dashboard - headline counts
pub async fn dashboard_get(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.store.dashboard_stats(Utc::now()).await?;
    Ok(ApiResponse::success(stats))
}
