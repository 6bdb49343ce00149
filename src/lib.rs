// Library crate for the FireEdge session gateway
// This file exposes the public API for integration tests

pub mod app;
pub mod config;
pub mod session;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use app::build_router;
pub use config::ServerConfig;
pub use session::{SessionRegistry, SessionService};
pub use shared::{AppError, AppState};
pub use websockets::{ConnectionManager, InMemoryConnectionManager, MessageType, WebSocketMessage};
