use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument, warn};

use crate::shared::{AppError, AppState};

/// Pulls the token out of an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header in request");
            AppError::Unauthorized("Missing authorization header".to_string())
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            warn!("Invalid Authorization header format (expected Bearer token)");
            AppError::Unauthorized("Invalid authorization header format".to_string())
        })
}

/// Session authentication middleware - validates the bearer token against the
/// session registry and adds `AuthenticatedUser` to the request.
/// Usage: .route_layer(middleware::from_fn_with_state(app_state.clone(), session::require_session))
/// Handlers can then extract Extension(user): Extension<AuthenticatedUser>.
#[instrument(skip_all, fields(uri = %req.uri()))]
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?.to_string();

    let user = match state.session_service.authenticate(&token).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Session authentication failed: {}", e);
            return Err(e);
        }
    };

    debug!(username = %user.username, "Authentication successful, adding user to request");

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
