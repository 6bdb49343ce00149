use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::types::TokenClaims;
use crate::shared::AppError;

/// A freshly signed token together with its absolute expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies the bearer tokens handed out at login
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Creates a new JWT token for `username`, valid for the configured ttl
    #[instrument(skip(self))]
    pub fn issue(&self, username: &str) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or_else(|| {
            debug!(ttl_secs = self.ttl.num_seconds(), "Token expiry out of range");
            AppError::Internal
        })?;

        debug!(
            ttl_secs = self.ttl.num_seconds(),
            exp_timestamp = expires_at.timestamp(),
            "Creating JWT token with expiration"
        );

        let claims = TokenClaims {
            sub: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Checks signature and expiry and returns the claims if valid.
    /// Every failure is reported as `Unauthorized`.
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AppError> {
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                username = %data.claims.sub,
                exp = data.claims.exp,
                "JWT token decoded successfully"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::Unauthorized("invalid token".to_string())
        })
    }
}
