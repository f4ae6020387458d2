//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use crate::common::{endpoints_overlap, split_host_port};
use crate::config::error::{ConfigError, Result};
use crate::config::types::ProxyConfig;

const LOG_LEVELS: [&str; 6] = ["error", "warn", "info", "debug", "trace", "off"];

/// Validate the configuration
///
/// Non-fatal problems are reported by [`ProxyConfig::check_warnings`] instead.
pub fn validate_config(config: &ProxyConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_admin_settings(config)?;
    Ok(())
}

/// Validate network settings
fn validate_network_settings(config: &ProxyConfig) -> Result<()> {
    for (name, addr) in [("listen", config.listen()), ("target", config.target())] {
        split_host_port(addr)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
    }

    // Names are not resolved here; only literal and loopback clashes are caught
    if endpoints_overlap(config.listen(), config.target()) {
        return Err(ConfigError::InvalidCombination(
            "Listen and target addresses must be different".to_string()
        ));
    }

    Ok(())
}

/// Validate admin API settings
fn validate_admin_settings(config: &ProxyConfig) -> Result<()> {
    if let Some(token) = config.admin_token() {
        if token.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "admin_token".to_string(),
                "Admin token must not be empty".to_string(),
            ));
        }
    }

    if let Some(admin) = config.admin_listen() {
        if endpoints_overlap(&admin.to_string(), config.listen()) {
            return Err(ConfigError::InvalidCombination(
                "Admin API and proxy cannot share a listen address".to_string()
            ));
        }
    }

    Ok(())
}

impl ProxyConfig {
    /// Validate this configuration
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }

    /// Check configuration for non-fatal problems
    pub fn check_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level().to_lowercase().as_str()) {
            warnings.push(format!(
                "Invalid log level: {}. Valid values are: {}",
                self.log_level(),
                LOG_LEVELS.join(", ")
            ));
        }

        if self.admin_listen().is_some() && self.admin_token().is_none() {
            warnings.push("Admin API is enabled without an admin token".to_string());
        }

        warnings
    }
}
