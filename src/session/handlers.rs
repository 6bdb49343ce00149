use axum::{extract::State, Extension, Json};
use tracing::{info, instrument};

use super::types::{
    AuthenticatedUser, LoginRequest, LoginResponse, RevokeReason, RevokeResponse, SessionInfo,
};
use crate::shared::{AppError, AppState};

/// HTTP handler for logging in
///
/// POST /api/auth
/// Returns a bearer token and its expiry
#[instrument(name = "login", skip_all, fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = state
        .session_service
        .login(&request.username, &request.password)
        .await?;

    info!(
        username = %response.username,
        token_length = response.token.len(),
        "Session created"
    );

    Ok(Json(response))
}

/// GET /api/session
#[instrument(name = "session_info", skip_all, fields(username = %user.username))]
pub async fn session_info(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<SessionInfo> {
    Json(state.session_service.session_info(&user))
}

/// POST /api/logout
/// Revokes the token the request was made with
#[instrument(name = "logout", skip_all, fields(username = %user.username))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<RevokeResponse> {
    let revoked = state
        .session_service
        .revoke_session(&user.token, RevokeReason::Logout)
        .await;

    Json(RevokeResponse {
        revoked: usize::from(revoked),
    })
}

/// DELETE /api/sessions
/// Revokes every token of the calling user
#[instrument(name = "logout_everywhere", skip_all, fields(username = %user.username))]
pub async fn logout_everywhere(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Json<RevokeResponse> {
    let revoked = state
        .session_service
        .revoke_user_sessions(&user.username)
        .await;

    Json(RevokeResponse { revoked })
}
