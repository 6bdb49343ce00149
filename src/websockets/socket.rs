use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Text-frame transport under a gated connection
#[async_trait]
pub trait SocketWrapper: Send {
    /// Writes one text frame
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Next text frame from the browser; `Ok(None)` once the peer has gone
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Sends a close frame
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Reacts to frames sent by the browser
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns the frame to send back, if any
    async fn handle_message(&self, username: &str, message: String) -> Option<String>;
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                // binary and control frames carry nothing for the session protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// A websocket bound to one session token. Frames queued by the
/// `ConnectionManager` are forwarded to the socket; when the manager drops
/// the last sender for the token the loop stops and a close frame goes out.
pub struct Connection {
    pub username: String,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        username: String,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            username,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Pumps frames both ways until the token is revoked or the peer leaves
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                queued = self.outbound_receiver.recv() => {
                    // last sender dropped: token revoked
                    let Some(frame) = queued else { break };
                    self.socket.send_message(frame).await?;
                }

                incoming = self.socket.receive_message() => {
                    let Some(frame) = incoming? else { break };
                    if let Some(reply) = self
                        .message_handler
                        .handle_message(&self.username, frame)
                        .await
                    {
                        self.socket.send_message(reply).await?;
                    }
                }
            }
        }

        let _ = self.socket.close().await;
        Ok(())
    }
}
