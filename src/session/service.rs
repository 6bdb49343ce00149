use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    credentials::CredentialVerifier,
    registry::SessionRegistry,
    token::TokenIssuer,
    types::{AuthenticatedUser, LoginResponse, RevokeReason, SessionInfo},
};
use crate::shared::AppError;
use crate::websockets::{ConnectionManager, WebSocketMessage};

/// Service for the login, authentication and logout flows built on top of
/// the session registry
pub struct SessionService {
    registry: Arc<SessionRegistry>,
    token_issuer: TokenIssuer,
    verifier: Arc<dyn CredentialVerifier>,
    connections: Arc<dyn ConnectionManager>,
}

impl SessionService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        token_issuer: TokenIssuer,
        verifier: Arc<dyn CredentialVerifier>,
        connections: Arc<dyn ConnectionManager>,
    ) -> Self {
        Self {
            registry,
            token_issuer,
            verifier,
            connections,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn connections(&self) -> &Arc<dyn ConnectionManager> {
        &self.connections
    }

    /// Verifies credentials, issues a token and registers it
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError> {
        if username.is_empty() || password.is_empty() {
            return Err(AppError::InvalidArgument(
                "username and password are required".to_string(),
            ));
        }

        if !self.verifier.verify(username, password).await? {
            warn!(username = %username, "Login rejected");
            return Err(AppError::Unauthorized("invalid credentials".to_string()));
        }

        let issued = self.token_issuer.issue(username)?;
        self.registry
            .add_session(username, &issued.token, issued.expires_at)?;

        info!(
            username = %username,
            expires_at = %issued.expires_at,
            active_sessions = self.registry.user_tokens(username).len(),
            "Login successful"
        );

        Ok(LoginResponse {
            token: issued.token,
            username: username.to_string(),
            expires_at: issued.expires_at,
        })
    }

    /// Resolves a bearer token to its user. Anything other than a signed,
    /// registered, unexpired token is `Unauthorized`.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let claims = self.token_issuer.verify(token)?;

        let Some(session) = self.registry.lookup_session(token) else {
            warn!(username = %claims.sub, "Session not found - may have been revoked");
            return Err(AppError::Unauthorized(
                "session not found or revoked".to_string(),
            ));
        };

        if session.user != claims.sub {
            warn!(
                claimed = %claims.sub,
                registered = %session.user,
                "Token subject does not match session owner"
            );
            return Err(AppError::Unauthorized("token subject mismatch".to_string()));
        }

        if session.expires <= Utc::now() {
            warn!(username = %session.user, "Session has expired");
            self.revoke_session(token, RevokeReason::Expired).await;
            return Err(AppError::Unauthorized("session expired".to_string()));
        }

        Ok(AuthenticatedUser {
            username: session.user,
            token: token.to_string(),
            expires_at: session.expires,
        })
    }

    /// Removes a token and closes any websocket opened with it.
    /// Returns false when the token was not registered.
    #[instrument(skip(self, token))]
    pub async fn revoke_session(&self, token: &str, reason: RevokeReason) -> bool {
        let Some(username) = self.registry.remove_session(token) else {
            return false;
        };

        let tokens = [token.to_string()];
        let closed = self.close_sockets(&tokens, reason).await;

        info!(
            username = %username,
            reason = reason.as_str(),
            closed_connections = closed,
            "Session revoked"
        );
        true
    }

    /// Revokes every token of `username`
    #[instrument(skip(self))]
    pub async fn revoke_user_sessions(&self, username: &str) -> usize {
        let tokens = self.registry.remove_user_sessions(username);
        let closed = self.close_sockets(&tokens, RevokeReason::UserSignedOut).await;

        info!(
            username = %username,
            revoked = tokens.len(),
            closed_connections = closed,
            "All sessions revoked for user"
        );
        tokens.len()
    }

    /// Removes every expired token
    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let expired = self.registry.remove_expired(Utc::now());
        let closed = self.close_sockets(&expired, RevokeReason::Expired).await;

        if !expired.is_empty() {
            info!(
                removed_sessions = expired.len(),
                closed_connections = closed,
                "Expired sessions cleaned up"
            );
        }
        expired.len()
    }

    /// Current session details for an authenticated user
    pub fn session_info(&self, user: &AuthenticatedUser) -> SessionInfo {
        SessionInfo {
            username: user.username.clone(),
            expires_at: user.expires_at,
            active_sessions: self.registry.user_tokens(&user.username).len(),
        }
    }

    async fn close_sockets(&self, tokens: &[String], reason: RevokeReason) -> usize {
        let message = WebSocketMessage::session_revoked(reason.as_str()).to_json();
        self.connections.close_connections(tokens, &message).await
    }
}
