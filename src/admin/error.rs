//! Admin API Error Types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

/// Result type for admin API operations
pub type AdminResult<T> = Result<T, AdminError>;

/// Admin API error types
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub message: String,

    /// Optional detailed error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            AdminError::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                "Authentication failed".to_string(),
                Some(msg.clone()),
            ),
            AdminError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "Bad request".to_string(),
                Some(msg.clone()),
            ),
            AdminError::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO error".to_string(),
                Some(e.to_string()),
            ),
            AdminError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(msg.clone()),
            ),
        };

        let error_response = ErrorResponse { message, details };
        (status, Json(error_response)).into_response()
    }
}

impl From<crate::common::ProxyError> for AdminError {
    fn from(err: crate::common::ProxyError) -> Self {
        match err {
            crate::common::ProxyError::InvalidDirection(_) => AdminError::BadRequest(err.to_string()),
            other => AdminError::Internal(other.to_string()),
        }
    }
}
