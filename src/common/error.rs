//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// TCP intercept error type
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying socket error
        #[source]
        source: io::Error,
    },

    /// `start` called while the accept loop is already running
    #[error("Proxy is already running on {0}")]
    AlreadyRunning(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown injection/relay direction
    #[error("Invalid direction: {0}. Valid values are: client, remote")]
    InvalidDirection(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `ProxyError`.
pub type Result<T> = std::result::Result<T, ProxyError>;
