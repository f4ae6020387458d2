//! Configuration loading functionality
//!
//! This module provides functionality for loading configuration from different sources
//! such as files, environment variables, and command-line arguments.

use log::{debug, info};
use std::env;
use std::fs;
use std::path::Path;

use crate::config::defaults::ENV_PREFIX;
use crate::config::error::{ConfigError, Result};
use crate::config::types::{ConfigValues, ProxyConfig, ValueSource};

impl ConfigValues {
    /// Load values from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::ParseError(format!("{}: {}", path.display(), e))
        })
    }

    /// Load values from `TCP_INTERCEPT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| env::var(format!("{}{}", ENV_PREFIX, name)).ok())
    }

    /// Load values through a variable lookup (name without prefix)
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T>(get_env: &impl Fn(&str) -> Option<String>, name: &str, key: &str) -> Result<Option<T>>
        where
            T: std::str::FromStr,
            T::Err: std::fmt::Display,
        {
            match get_env(name) {
                Some(value) => value
                    .parse::<T>()
                    .map(Some)
                    .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
                None => Ok(None),
            }
        }

        Ok(Self {
            listen: get_env("LISTEN"),
            target: get_env("TARGET"),
            delimiter: parse(&get_env, "DELIMITER", "delimiter")?,
            failure_policy: parse(&get_env, "FAILURE_POLICY", "failure_policy")?,
            client_handler: parse(&get_env, "CLIENT_HANDLER", "client_handler")?,
            remote_handler: parse(&get_env, "REMOTE_HANDLER", "remote_handler")?,
            log_level: get_env("LOG_LEVEL"),
            admin_listen: parse(&get_env, "ADMIN_LISTEN", "admin_listen")?,
            admin_token: get_env("ADMIN_TOKEN"),
        })
    }
}

impl ProxyConfig {
    /// Load configuration from a JSON file on top of the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let values = ConfigValues::from_file(path)?;
        Ok(Self::default().merged(values, ValueSource::File))
    }

    /// Load configuration from all sources and validate it
    ///
    /// Priority, lowest first: defaults, `file`, environment, `cli`.
    pub fn load(file: Option<&Path>, cli: ConfigValues) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file {
            info!("Loading configuration from file: {}", path.display());
            config.apply(ConfigValues::from_file(path)?, ValueSource::File);
        }

        config.apply(ConfigValues::from_env()?, ValueSource::Environment);
        config.apply(cli, ValueSource::CommandLine);

        config.validate()?;
        debug!("Configuration validated successfully");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use crate::proxy::{FailurePolicy, HandlerKind};

    #[test]
    fn test_from_env_with() {
        let vars: HashMap<&str, &str> = [
            ("LISTEN", "0.0.0.0:7000"),
            ("DELIMITER", "\\0"),
            ("FAILURE_POLICY", "session"),
            ("REMOTE_HANDLER", "lowercase"),
        ]
        .into_iter()
        .collect();

        let values = ConfigValues::from_env_with(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(values.listen.as_deref(), Some("0.0.0.0:7000"));
        assert_eq!(values.delimiter.map(|d| d.0), Some(0));
        assert_eq!(values.failure_policy, Some(FailurePolicy::Session));
        assert_eq!(values.remote_handler, Some(HandlerKind::Lowercase));
        assert!(values.target.is_none());
        assert!(values.client_handler.is_none());
    }

    #[test]
    fn test_from_env_with_invalid_value() {
        let result = ConfigValues::from_env_with(|name| {
            (name == "CLIENT_HANDLER").then(|| "rot13".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue(key, _)) if key == "client_handler"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"listen": "127.0.0.1:7100", "delimiter": ";", "client_handler": "uppercase"}}"#
        )
        .unwrap();

        let config = ProxyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen(), "127.0.0.1:7100");
        assert_eq!(config.delimiter(), b';');
        assert_eq!(config.client_handler(), HandlerKind::Uppercase);
        assert_eq!(config.source("listen"), ValueSource::File);
    }

    #[test]
    fn test_from_missing_file() {
        let result = ProxyConfig::from_file("definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_from_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ProxyConfig::from_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
