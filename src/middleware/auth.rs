use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth::bearer_token;
use crate::database::models::User;
use crate::error::ApiError;
use crate::state::AppState;
use crate::types::{Access, Role};

/// The caller behind a verified bearer token, loaded from the store
#[derive(Clone, Debug)]
pub struct Identity {
    pub user: User,
}

impl Identity {
    pub fn id(&self) -> uuid::Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

/// Optional caller for routes that also serve anonymous visitors
#[derive(Clone, Debug, Default)]
pub struct Viewer(pub Option<Identity>);

impl Viewer {
    /// Anonymous visitors read the catalog as non-subscribers
    pub fn role(&self) -> Role {
        self.0.as_ref().map(Identity::role).unwrap_or_default()
    }
}

/// Resolve the token in `headers` to an active user.
///
/// `Ok(None)` means no Authorization header was sent at all.
pub async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| ApiError::unauthorized("Invalid Authorization header format")))
        .transpose()?;

    let Some(token) = bearer_token(header)? else {
        return Ok(None);
    };

    let claims = state.tokens.verify(token)?;
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown account"))?;

    if !user.is_active {
        debug!(user_id = %user.id, "token presented for deactivated account");
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    Ok(Some(Identity { user }))
}

/// Verify the caller and check the stored role against `access`
pub async fn gate(state: &AppState, headers: &HeaderMap, access: Access) -> Result<Identity, ApiError> {
    let identity = resolve_identity(state, headers)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    if !access.permits(identity.role()) {
        warn!(user_id = %identity.id(), role = %identity.role(), ?access, "access denied");
        return Err(ApiError::forbidden("Insufficient permissions"));
    }

    Ok(identity)
}

async fn run_gated(state: AppState, access: Access, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let identity = gate(&state, request.headers(), access).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Route layer: any active account
pub async fn require_user(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    run_gated(state, Access::Authenticated, request, next).await
}

/// Route layer: admin only
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    run_gated(state, Access::Admin, request, next).await
}

/// Route layer: attach the caller when a token is present.
///
/// A missing token means anonymous; a bad token is still rejected.
pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let identity = resolve_identity(&state, request.headers()).await?;
    request.extensions_mut().insert(Viewer(identity));
    Ok(next.run(request).await)
}
