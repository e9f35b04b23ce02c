// handlers/public/visa.rs - /visa/* catalog handlers
//
// Every handler reads the caller's role from the `Viewer` extension set by
// the identify layer. Anonymous callers read as non-subscribers.

use axum::extract::State;
use axum::Extension;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, ValidPath, ValidQuery, Viewer};
use crate::services::catalog::{
    self, CountrySummary, MatrixRow, RequirementsView, SearchParams, VisaTypeListing, VisaTypeSummary,
};
use crate::state::AppState;

/// GET /visa/countries - countries with at least one active visa type
pub async fn countries_get(State(state): State<AppState>) -> ApiResult<Vec<CountrySummary>> {
    Ok(ApiResponse::success(catalog::list_countries(&state).await?))
}

/// GET /visa/types/:country - visa types for a country name or code
pub async fn types_get(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ValidPath(country): ValidPath<String>,
) -> ApiResult<VisaTypeListing> {
    Ok(ApiResponse::success(catalog::list_types(&state, &country, viewer.role()).await?))
}

/// GET /visa/requirements/:id - tiered requirements for one visa type
pub async fn requirements_get(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<RequirementsView> {
    Ok(ApiResponse::success(catalog::get_requirements(&state, id, viewer.role()).await?))
}

/// GET /visa/search?q=&country=&category=
pub async fn search_get(
    State(state): State<AppState>,
    ValidQuery(params): ValidQuery<SearchParams>,
) -> ApiResult<Vec<VisaTypeSummary>> {
    Ok(ApiResponse::success(catalog::search(&state, params).await?))
}

/// GET /visa/matrix - country by category overview
pub async fn matrix_get(State(state): State<AppState>) -> ApiResult<Vec<MatrixRow>> {
    Ok(ApiResponse::success(catalog::matrix(&state).await?))
}
