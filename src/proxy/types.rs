//! Relay direction and failure policy types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::ProxyError;

/// Relay direction
///
/// Names the side a frame was read from. `Client` frames travel client to
/// remote, `Remote` frames travel remote to client. Injection buffers are
/// keyed the same way: bytes injected on `Client` are written toward the
/// remote endpoint, bytes injected on `Remote` toward the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Client to remote
    Client,
    /// Remote to client
    Remote,
}

impl Direction {
    /// Both directions, client first
    pub const ALL: [Direction; 2] = [Direction::Client, Direction::Remote];

    /// Lowercase name used in logs and on the admin API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ProxyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "remote" => Ok(Self::Remote),
            _ => Err(ProxyError::InvalidDirection(s.to_string())),
        }
    }
}

/// What a relay-level I/O failure tears down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any pipe or drain failure stops the whole proxy
    #[default]
    Global,
    /// A failure ends only the pipe or drain that observed it
    #[serde(alias = "per-session")]
    Session,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Session => write!(f, "session"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = ProxyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "session" | "per-session" => Ok(Self::Session),
            _ => Err(ProxyError::Config(format!(
                "Invalid failure policy: {}. Valid values are: global, session",
                s
            ))),
        }
    }
}
