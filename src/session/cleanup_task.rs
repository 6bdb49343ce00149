use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::service::SessionService;

/// Configuration for the expiry sweep
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to look for expired tokens
    pub cleanup_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5 * 60), // 5 minutes
        }
    }
}

/// Starts the background task that periodically revokes expired tokens
#[instrument(skip(session_service))]
pub async fn start_cleanup_task(session_service: Arc<SessionService>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        "Starting session cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;
        run_cleanup(&session_service).await;
    }
}

async fn run_cleanup(session_service: &SessionService) -> usize {
    let removed = session_service.cleanup_expired_sessions().await;
    let registry = session_service.registry();

    debug!(
        removed,
        remaining_sessions = registry.session_count(),
        remaining_tokens = registry.token_count(),
        "Session cleanup pass finished"
    );
    removed
}
