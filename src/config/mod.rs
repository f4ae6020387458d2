//! Configuration module
//!
//! This module handles application configuration, including loading from
//! different sources (files, environment variables, command line arguments)
//! and validating the configuration.

pub mod defaults;
pub mod error;
mod loader;
mod merger;
pub mod types;
mod validator;

pub use defaults::ENV_PREFIX;
pub use error::ConfigError;
pub use types::{ConfigValues, Delimiter, ProxyConfig, ValueSource};
pub use validator::validate_config;
