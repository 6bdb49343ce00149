use fireedge::{
    build_router,
    session::{
        credentials::InMemoryCredentialVerifier, start_cleanup_task, token::TokenIssuer,
        CleanupConfig, SessionRegistry, SessionService,
    },
    AppState, InMemoryConnectionManager, ServerConfig,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fireedge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FireEdge session gateway");

    let config = ServerConfig::from_env();
    if config.users.is_empty() {
        warn!("FIREEDGE_USERS is empty, every login will be rejected");
    }

    // The one registry for this process; everything else reaches it through AppState
    let registry = Arc::new(SessionRegistry::new());

    let session_service = Arc::new(SessionService::new(
        registry,
        TokenIssuer::new(config.jwt_secret.clone(), config.session_ttl),
        Arc::new(InMemoryCredentialVerifier::with_users(config.users.clone())),
        Arc::new(InMemoryConnectionManager::new()),
    ));

    tokio::spawn(start_cleanup_task(
        session_service.clone(),
        CleanupConfig {
            cleanup_interval: config.cleanup_interval,
        },
    ));

    let app = build_router(AppState::new(session_service));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(bind_addr = %config.bind_addr, "Server listening");
    axum::serve(listener, app).await
}
