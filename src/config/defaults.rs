//! Default configuration values
//!
//! Shared by the config accessors and the proxy builder.

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TCP_INTERCEPT_";

/// Default listen address
pub const LISTEN_STR: &str = "127.0.0.1:9000";

/// Default target address
pub const TARGET_STR: &str = "127.0.0.1:9001";

/// Default frame delimiter
pub const DELIMITER: u8 = b'\n';

/// Default log level
pub const LOG_LEVEL_STR: &str = "info";
