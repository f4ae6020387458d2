//! Admin API response types

use serde::{Deserialize, Serialize};

use crate::proxy::FailurePolicy;

/// Snapshot of the proxy state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyStatus {
    /// Configured listen address
    pub listen: String,
    /// Bound listen address, once started
    pub local_addr: Option<String>,
    /// Remote target address
    pub target: String,
    /// Frame delimiter, escaped
    pub delimiter: String,
    /// Failure policy
    pub failure_policy: FailurePolicy,
    /// Whether the proxy has been stopped
    pub stopped: bool,
    /// Injected bytes waiting to be written toward the remote
    pub pending_client: usize,
    /// Injected bytes waiting to be written toward the client
    pub pending_remote: usize,
}

/// Result of an injection request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjectResponse {
    /// Direction the bytes were queued on
    pub direction: String,
    /// Number of bytes accepted by this request
    pub queued: usize,
    /// Bytes pending on that direction after the request
    pub pending: usize,
}
