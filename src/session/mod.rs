// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, CleanupConfig};
pub use handlers::{login, logout, logout_everywhere, session_info};
pub use middleware::{bearer_token, require_session};
pub use registry::SessionRegistry;
pub use service::SessionService;
pub use types::{AuthenticatedUser, LoginResponse, RevokeReason, SessionInfo, SessionLookup};

// Internal modules
mod cleanup_task;
pub mod credentials;
mod handlers;
mod middleware;
pub mod registry;
pub mod service;
pub mod token;
pub mod types;
