//! Configuration types
//!
//! This module contains the main configuration types used throughout the application.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::common::escape_bytes;
use crate::config::defaults;
use crate::config::error::{ConfigError, Result};
use crate::proxy::{FailurePolicy, HandlerKind};

/// Frame delimiter byte
///
/// Parsed from a single character (`;`), an escape (`\n`, `\r`, `\t`, `\0`,
/// `\xNN`) or a hex literal (`0x0a`). JSON may also give a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Delimiter(pub u8);

impl FromStr for Delimiter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            ConfigError::InvalidValue(
                "delimiter".to_string(),
                format!("'{}' is not a single byte", escape_bytes(s.as_bytes())),
            )
        };

        let byte = match s.as_bytes() {
            [b] => *b,
            [b'\\', b'n'] => b'\n',
            [b'\\', b'r'] => b'\r',
            [b'\\', b't'] => b'\t',
            [b'\\', b'0'] => 0,
            [b'\\', b'\\'] => b'\\',
            [b'\\', b'x', hex @ ..] | [b'0', b'x', hex @ ..] if hex.len() == 2 => {
                let hex = std::str::from_utf8(hex).map_err(|_| invalid())?;
                u8::from_str_radix(hex, 16).map_err(|_| invalid())?
            }
            _ => return Err(invalid()),
        };
        Ok(Self(byte))
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape_bytes(&[self.0]))
    }
}

impl Serialize for Delimiter {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Delimiter {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Byte(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Byte(b) => Ok(Self(b)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Default value
    Default,
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Configuration values
///
/// Every field is optional; unset fields resolve to the defaults in
/// [`defaults`](crate::config::defaults) through the [`ProxyConfig`] accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigValues {
    // --- Relay settings ---

    /// Listen address (host:port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Remote target address (host:port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Frame delimiter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<Delimiter>,

    /// What a relay failure tears down
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,

    /// Handler for frames read from the client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_handler: Option<HandlerKind>,

    /// Handler for frames read from the remote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_handler: Option<HandlerKind>,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    // --- Admin API ---

    /// Admin API listen address; the API is disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_listen: Option<SocketAddr>,

    /// Bearer token required by the admin API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// Proxy configuration
///
/// Resolved view over [`ConfigValues`] merged from defaults, file,
/// environment and command line, with the source of every set value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Configuration values
    pub values: ConfigValues,

    /// Source tracking for configuration values
    pub sources: HashMap<&'static str, ValueSource>,
}

impl ProxyConfig {
    /// Configuration from explicit values, tagged as command line input
    pub fn from_values(values: ConfigValues) -> Self {
        let mut config = Self::default();
        config.apply(values, ValueSource::CommandLine);
        config
    }

    /// Get the source of a configuration value
    pub fn source(&self, name: &str) -> ValueSource {
        self.sources.get(name).copied().unwrap_or(ValueSource::Default)
    }

    /// Get the listen address
    pub fn listen(&self) -> &str {
        self.values.listen.as_deref().unwrap_or(defaults::LISTEN_STR)
    }

    /// Get the target address
    pub fn target(&self) -> &str {
        self.values.target.as_deref().unwrap_or(defaults::TARGET_STR)
    }

    /// Get the frame delimiter byte
    pub fn delimiter(&self) -> u8 {
        self.values.delimiter.map(|d| d.0).unwrap_or(defaults::DELIMITER)
    }

    /// Get the failure policy
    pub fn failure_policy(&self) -> FailurePolicy {
        self.values.failure_policy.unwrap_or_default()
    }

    /// Get the client-side handler kind
    pub fn client_handler(&self) -> HandlerKind {
        self.values.client_handler.unwrap_or_default()
    }

    /// Get the remote-side handler kind
    pub fn remote_handler(&self) -> HandlerKind {
        self.values.remote_handler.unwrap_or_default()
    }

    /// Get the log level
    pub fn log_level(&self) -> &str {
        self.values.log_level.as_deref().unwrap_or(defaults::LOG_LEVEL_STR)
    }

    /// Get the admin API listen address
    pub fn admin_listen(&self) -> Option<SocketAddr> {
        self.values.admin_listen
    }

    /// Get the admin API token
    pub fn admin_token(&self) -> Option<&str> {
        self.values.admin_token.as_deref()
    }
}
