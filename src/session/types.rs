use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a reverse-index lookup: the owning user and that token's expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLookup {
    pub user: String,
    pub expires: DateTime<Utc>,
}

/// One active token as seen through `SessionRegistry::user_tokens`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// JWT claims structure carried by every issued token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String, // Username
    pub jti: String, // Unique per login
    pub exp: usize,  // Expiration timestamp (standard JWT claim)
    pub iat: usize,  // Issued at timestamp (standard JWT claim)
}

/// Identity attached to a request once its bearer token has been accepted.
/// Handlers extract it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a token is being revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeReason {
    /// Explicit logout of this token
    Logout,
    /// A downstream orchestrator call answered 401 for this token
    UpstreamUnauthorized,
    /// Found expired at lookup time or by the sweep
    Expired,
    /// The user signed out of every device
    UserSignedOut,
}

impl RevokeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevokeReason::Logout => "logout",
            RevokeReason::UpstreamUnauthorized => "upstream_unauthorized",
            RevokeReason::Expired => "expired",
            RevokeReason::UserSignedOut => "user_signed_out",
        }
    }
}

/// Request body for `POST /api/auth`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response structure for a successful login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Response structure for `GET /api/session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    pub username: String,
    pub expires_at: DateTime<Utc>,
    pub active_sessions: usize,
}

/// Response structure for the revoke endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevokeResponse {
    pub revoked: usize,
}
