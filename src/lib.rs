//! TCP Intercept: transparent TCP relay with frame rewriting and byte injection
//!
//! This library implements a TCP relay that sits between clients and a single
//! remote service. Traffic in each direction is split into delimiter-terminated
//! frames, each frame is passed through a handler that may rewrite or suppress
//! it, and arbitrary bytes can be injected toward either side at runtime.
//! It is intended for fault-injection and protocol testing.
//!
//! # Main Features
//!
//! - Per-direction frame handlers (closures or [`FrameHandler`] impls)
//! - Out-of-band injection toward the client or the remote
//! - Global or per-session failure policy
//! - Optional HTTP admin API for status, injection and shutdown
//!
//! # Example
//!
//! ```no_run
//! use tcp_intercept::{Direction, ProxyServer, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let proxy = ProxyServer::builder("127.0.0.1:9000", "127.0.0.1:9001")
//!         .client_handler(|frame: &[u8]| frame.to_ascii_uppercase())
//!         .build();
//!
//!     proxy.start().await?;
//!
//!     // Queue a line toward a connected client
//!     proxy.inject(Direction::Remote, b"hello\n");
//!
//!     proxy.wait().await;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod admin;
pub mod common;
pub mod config;
pub mod proxy;

// Re-export commonly used structures and functions for convenience
pub use common::{ProxyError, Result};
pub use config::ProxyConfig;
pub use proxy::{Direction, FailurePolicy, FrameHandler, ProxyServer};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
