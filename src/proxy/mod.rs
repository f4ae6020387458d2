//! Proxy module
//!
//! The relay engine: listener lifecycle, per-client sessions, per-direction
//! frame pipes and out-of-band byte injection.
//!
//! ```text
//! client ──read──▶ pipe(Client) ──handler──▶ SafeConnection(remote) ◀── drain(Client)
//! client ◀── SafeConnection(client) ◀──handler── pipe(Remote) ◀──read── remote
//!                       ▲
//!                  drain(Remote)
//! ```

pub mod connection;
pub mod handler;
mod injector;
mod pipe;
pub mod server;
mod session;
pub mod stop;
pub mod types;

pub use connection::SafeConnection;
pub use handler::{FrameHandler, HandlerKind, LogFrames, Passthrough, SharedHandler};
pub use server::{ProxyServer, ProxyServerBuilder};
pub use stop::StopSignal;
pub use types::{Direction, FailurePolicy};
