use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Client -> Server
    Ping,

    // Server -> Client
    Pong,
    SessionOpened,
    SessionRevoked,
    Error,
}

/// Metadata for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessageMeta {
    pub timestamp: DateTime<Utc>,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub meta: Option<WebSocketMessageMeta>,
}

/// Helper functions for creating messages
impl WebSocketMessage {
    pub fn new(message_type: MessageType, payload: serde_json::Value) -> Self {
        Self {
            message_type,
            payload,
            meta: Some(WebSocketMessageMeta {
                timestamp: Utc::now(),
            }),
        }
    }

    /// Create a SESSION_OPENED message, sent once the handshake is accepted
    pub fn session_opened(username: &str, expires_at: DateTime<Utc>) -> Self {
        Self::new(
            MessageType::SessionOpened,
            json!({ "username": username, "expires_at": expires_at }),
        )
    }

    /// Create a SESSION_REVOKED message, sent right before the socket is closed
    pub fn session_revoked(reason: &str) -> Self {
        Self::new(MessageType::SessionRevoked, json!({ "reason": reason }))
    }

    pub fn pong() -> Self {
        Self::new(MessageType::Pong, serde_json::Value::Null)
    }

    pub fn error(message: &str) -> Self {
        Self::new(MessageType::Error, json!({ "message": message }))
    }

    pub fn to_json(&self) -> String {
        // Every payload is built from plain JSON values, so this cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_names() {
        let message = WebSocketMessage::session_revoked("logout");
        let json = message.to_json();

        assert!(json.contains("\"type\":\"SESSION_REVOKED\""));
        assert!(json.contains("\"reason\":\"logout\""));
    }

    #[test]
    fn test_parse_client_ping_without_payload() {
        let parsed: WebSocketMessage = serde_json::from_str(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(parsed.message_type, MessageType::Ping);
        assert!(parsed.meta.is_none());
    }

    #[test]
    fn test_session_opened_payload() {
        let expires_at = Utc::now();
        let message = WebSocketMessage::session_opened("alice", expires_at);

        assert_eq!(message.message_type, MessageType::SessionOpened);
        assert_eq!(message.payload["username"], "alice");
    }
}
