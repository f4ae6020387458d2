//! Configuration errors
//!
//! This module defines error types for the configuration module.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Error reading file
    #[error("Error reading configuration file {}: {}", .0.display(), .1)]
    FileReadError(PathBuf, String),

    /// Error parsing configuration
    #[error("Error parsing configuration: {0}")]
    ParseError(String),

    /// Invalid value for configuration option
    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),

    /// Invalid combination of configuration options
    #[error("Invalid combination of configuration options: {0}")]
    InvalidCombination(String),
}

/// Result type alias for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

// Convert to crate's common error type
impl From<ConfigError> for crate::common::ProxyError {
    fn from(err: ConfigError) -> Self {
        crate::common::ProxyError::Config(err.to_string())
    }
}
