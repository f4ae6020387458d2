//! Common module
//!
//! This module contains shared errors and utility functions used throughout the application.

pub mod error;
pub mod log;
pub mod net;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result};
pub use log::{init_logger, escape_bytes};
pub use net::{endpoints_overlap, split_host_port};
