//! Frame handlers
//!
//! A handler turns one delimiter-terminated frame into the bytes written to
//! the other side. An empty result suppresses the frame.

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::common::{escape_bytes, ProxyError};
use super::types::Direction;

/// Transformation applied to every frame read in one direction
///
/// Any `Fn(&[u8]) -> Vec<u8> + Send + Sync` closure is a handler.
#[cfg_attr(test, mockall::automock)]
pub trait FrameHandler: Send + Sync {
    /// Transform a frame (trailing delimiter included)
    fn transform(&self, frame: &[u8]) -> Vec<u8>;
}

impl<F> FrameHandler for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn transform(&self, frame: &[u8]) -> Vec<u8> {
        self(frame)
    }
}

/// Shared, type-erased handler
pub type SharedHandler = Arc<dyn FrameHandler>;

/// Forwards frames unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl FrameHandler for Passthrough {
    fn transform(&self, frame: &[u8]) -> Vec<u8> {
        frame.to_vec()
    }
}

/// Forwards frames unchanged and logs each one
#[derive(Debug, Clone, Copy)]
pub struct LogFrames {
    direction: Direction,
}

impl LogFrames {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl FrameHandler for LogFrames {
    fn transform(&self, frame: &[u8]) -> Vec<u8> {
        info!("[{}] {} bytes: {}", self.direction, frame.len(), escape_bytes(frame));
        frame.to_vec()
    }
}

/// Built-in handlers selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Forward frames unchanged
    #[default]
    Passthrough,
    /// ASCII-uppercase every frame
    Uppercase,
    /// ASCII-lowercase every frame
    Lowercase,
    /// Suppress every frame
    Drop,
    /// Forward unchanged, logging each frame
    Log,
}

impl HandlerKind {
    /// Instantiate the handler for frames read in `direction`
    pub fn build(self, direction: Direction) -> SharedHandler {
        match self {
            Self::Passthrough => Arc::new(Passthrough),
            Self::Uppercase => Arc::new(|frame: &[u8]| frame.to_ascii_uppercase()),
            Self::Lowercase => Arc::new(|frame: &[u8]| frame.to_ascii_lowercase()),
            Self::Drop => Arc::new(|_: &[u8]| Vec::new()),
            Self::Log => Arc::new(LogFrames::new(direction)),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => write!(f, "passthrough"),
            Self::Uppercase => write!(f, "uppercase"),
            Self::Lowercase => write!(f, "lowercase"),
            Self::Drop => write!(f, "drop"),
            Self::Log => write!(f, "log"),
        }
    }
}

impl FromStr for HandlerKind {
    type Err = ProxyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passthrough" => Ok(Self::Passthrough),
            "uppercase" => Ok(Self::Uppercase),
            "lowercase" => Ok(Self::Lowercase),
            "drop" => Ok(Self::Drop),
            "log" => Ok(Self::Log),
            _ => Err(ProxyError::Config(format!(
                "Invalid handler: {}. Valid values are: passthrough, uppercase, lowercase, drop, log",
                s
            ))),
        }
    }
}
