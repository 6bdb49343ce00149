use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::shared::AppError;

/// Checks a username/password pair against the cloud orchestrator.
///
/// `Ok(false)` means the credentials were rejected; `Err` is reserved for
/// failures to reach a verdict.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<bool, AppError>;
}

/// Fixed credential table for development and testing.
///
/// Stands in for the orchestrator when running the gateway locally.
/// Passwords are held in memory as given.
pub struct InMemoryCredentialVerifier {
    users: HashMap<String, String>,
}

impl InMemoryCredentialVerifier {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
        }
    }

    /// Creates a verifier with pre-populated (username, password) pairs
    pub fn with_users<I>(users: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            users: users.into_iter().collect(),
        }
    }
}

impl Default for InMemoryCredentialVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryCredentialVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<bool, AppError> {
        let accepted = self
            .users
            .get(username)
            .is_some_and(|expected| expected == password);

        debug!(username = %username, accepted, "Checked credentials");
        Ok(accepted)
    }
}
