use async_trait::async_trait;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::{AuthenticatedUser, SessionService};
use crate::shared::{AppError, AppState};
use crate::websockets::messages::{MessageType, WebSocketMessage};

use super::socket::{Connection, MessageHandler, SocketWrapper};

/// Message handler for messages received from the browser.
/// Answers PING; everything else is logged and dropped.
pub struct WebsocketReceiveHandler;

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(&self, username: &str, message: String) -> Option<String> {
        match serde_json::from_str::<WebSocketMessage>(&message) {
            Ok(ws_message) => match ws_message.message_type {
                MessageType::Ping => Some(WebSocketMessage::pong().to_json()),
                other => {
                    debug!(
                        username = %username,
                        message_type = ?other,
                        "Unhandled message type"
                    );
                    None
                }
            },
            Err(e) => {
                warn!(
                    username = %username,
                    error = %e,
                    "Failed to parse WebSocket message"
                );
                Some(WebSocketMessage::error("malformed message").to_json())
            }
        }
    }
}

/// Query parameters for the websocket handshake
#[derive(Debug, Default, Deserialize)]
pub struct WebSocketQuery {
    pub token: Option<String>,
}

/// WebSocket endpoint gated by a session token
/// GET /ws with the token in the Sec-WebSocket-Protocol header or `?token=`.
/// The token is checked before the upgrade request itself.
pub async fn websocket_handler(
    ws: Option<WebSocketUpgrade>,
    headers: HeaderMap,
    Query(query): Query<WebSocketQuery>,
    State(app_state): State<AppState>,
) -> Result<Response, AppError> {
    info!("WebSocket connection requested");

    let service = &app_state.session_service;
    let offered = offered_protocols(&headers);

    let (user, echo_protocol) = if offered.is_empty() {
        let Some(token) = query.token.filter(|t| !t.is_empty()) else {
            warn!("Missing websocket authentication token");
            return Err(AppError::Unauthorized(
                "Missing authentication token".to_string(),
            ));
        };
        (service.authenticate(&token).await?, None)
    } else {
        let (user, protocol) = authenticate_offered(service, offered).await?;
        (user, Some(protocol))
    };

    info!(
        username = %user.username,
        "WebSocket authentication successful"
    );

    let Some(ws) = ws else {
        warn!(username = %user.username, "Authenticated request is not a websocket upgrade");
        return Err(AppError::InvalidArgument(
            "websocket upgrade required".to_string(),
        ));
    };

    // Browsers require the offered subprotocol to be echoed back
    let ws = match echo_protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };

    let service = app_state.session_service.clone();
    Ok(ws.on_upgrade(move |socket| run_gated_connection(Box::new(socket), user, service)))
}

/// Entries of the comma separated Sec-WebSocket-Protocol header
fn offered_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// The first offered entry that is a live session token wins; otherwise
/// the error of the last entry tried is returned
async fn authenticate_offered(
    service: &SessionService,
    offered: Vec<String>,
) -> Result<(AuthenticatedUser, String), AppError> {
    let mut last_error = AppError::Unauthorized("Missing authentication token".to_string());
    for protocol in offered {
        match service.authenticate(&protocol).await {
            Ok(user) => return Ok((user, protocol)),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

/// Registers the socket under its token and runs it until the token is
/// revoked or the browser goes away
async fn run_gated_connection(
    socket: Box<dyn SocketWrapper>,
    user: AuthenticatedUser,
    service: Arc<SessionService>,
) {
    let connection_id = Uuid::new_v4().to_string();
    info!(
        connection_id = %connection_id,
        username = %user.username,
        "WebSocket connection established"
    );

    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    let connections = service.connections().clone();
    connections
        .add_connection(
            connection_id.clone(),
            user.token.clone(),
            user.username.clone(),
            outbound_sender.clone(),
        )
        .await;

    // The token may have been revoked between the handshake and registration
    if service.registry().lookup_session(&user.token).is_none() {
        warn!(username = %user.username, "Token revoked during handshake, closing");
        connections.remove_connection(&connection_id).await;
        return;
    }

    let _ = outbound_sender
        .send(WebSocketMessage::session_opened(&user.username, user.expires_at).to_json());
    // Only the connection manager keeps a sender, so revocation closes the loop
    drop(outbound_sender);

    let connection = Connection::new(
        user.username.clone(),
        socket,
        outbound_receiver,
        Arc::new(WebsocketReceiveHandler),
    );

    match connection.run().await {
        Ok(()) => {
            info!(
                connection_id = %connection_id,
                username = %user.username,
                "WebSocket connection closed cleanly"
            );
        }
        Err(e) => {
            warn!(
                connection_id = %connection_id,
                username = %user.username,
                error = ?e,
                "WebSocket connection error"
            );
        }
    }

    connections.remove_connection(&connection_id).await;
}
