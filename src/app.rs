use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::session;
use crate::shared::AppState;
use crate::websockets::websocket_handler;

/// Builds the HTTP router. Routes under `/api` other than login require a
/// registered bearer token.
pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/session", get(session::session_info))
        .route("/api/logout", post(session::logout))
        .route("/api/sessions", delete(session::logout_everywhere))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/", get(|| async { "FireEdge session gateway" }))
        .route("/api/auth", post(session::login))
        .route("/ws", get(websocket_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
