//! Admin API Module
//!
//! HTTP control surface for a running proxy:
//! - status of the proxy and its injection queues
//! - injecting and clearing out-of-band bytes per direction
//! - stopping the proxy
//!
//! The admin API runs as a separate tokio task next to the proxy and uses
//! axum for HTTP handling and tower-http for request tracing. When a token is
//! configured, every `/api` route requires `Authorization: Bearer <token>`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod types;

pub use error::{AdminError, AdminResult};
pub use server::{build_router, start_admin_server, AdminServerConfig, AdminState};
pub use types::{InjectResponse, ProxyStatus};
