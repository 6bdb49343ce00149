use axum::Router;
use chrono::Duration;
use std::sync::Arc;

use fireedge::{
    build_router,
    session::{credentials::InMemoryCredentialVerifier, token::TokenIssuer},
    AppState, InMemoryConnectionManager, SessionRegistry, SessionService,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub const TEST_SECRET: &str = "integration-test-secret";

pub struct TestSetup {
    pub app: Router,
    pub registry: Arc<SessionRegistry>,
    pub service: Arc<SessionService>,
}

pub struct TestSetupBuilder {
    users: Vec<(String, String)>,
    ttl: Duration,
}

#[allow(dead_code)]
impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            ttl: Duration::hours(1),
        }
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.users.push((username.to_string(), password.to_string()));
        self
    }

    pub fn with_alice_and_bob(self) -> Self {
        self.with_user("alice", "wonderland").with_user("bob", "builder")
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> TestSetup {
        let registry = Arc::new(SessionRegistry::new());
        let service = Arc::new(SessionService::new(
            registry.clone(),
            TokenIssuer::new(TEST_SECRET, self.ttl),
            Arc::new(InMemoryCredentialVerifier::with_users(self.users)),
            Arc::new(InMemoryConnectionManager::new()),
        ));

        TestSetup {
            app: build_router(AppState::new(service.clone())),
            registry,
            service,
        }
    }
}
