use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Tracks live websocket connections and the token each one was opened with
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn add_connection(
        &self,
        connection_id: String,
        token: String,
        username: String,
        sender: mpsc::UnboundedSender<String>,
    );

    async fn remove_connection(&self, connection_id: &str);

    /// Sends `message` to every connection opened with one of `tokens`, then
    /// drops their outbound senders so the sockets close. Returns how many
    /// connections were closed.
    async fn close_connections(&self, tokens: &[String], message: &str) -> usize;

    async fn connection_count(&self) -> usize;
}

struct ConnectionEntry {
    token: String,
    username: String,
    sender: mpsc::UnboundedSender<String>,
}

pub struct InMemoryConnectionManager {
    // connection_id -> entry
    connections: Arc<RwLock<HashMap<String, ConnectionEntry>>>,
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(
        &self,
        connection_id: String,
        token: String,
        username: String,
        sender: mpsc::UnboundedSender<String>,
    ) {
        let mut connections = self.connections.write().await;
        connections.insert(
            connection_id,
            ConnectionEntry {
                token,
                username,
                sender,
            },
        );
    }

    async fn remove_connection(&self, connection_id: &str) {
        let mut connections = self.connections.write().await;
        connections.remove(connection_id);
    }

    async fn close_connections(&self, tokens: &[String], message: &str) -> usize {
        if tokens.is_empty() {
            return 0;
        }

        let mut connections = self.connections.write().await;
        let before = connections.len();

        connections.retain(|connection_id, entry| {
            if !tokens.contains(&entry.token) {
                return true;
            }
            let _ = entry.sender.send(message.to_string());
            debug!(
                connection_id = %connection_id,
                username = %entry.username,
                "Closing websocket for revoked token"
            );
            false
        });

        before - connections.len()
    }

    async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
