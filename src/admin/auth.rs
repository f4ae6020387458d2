//! Bearer token authentication for the admin API

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::admin::error::AdminError;
use crate::admin::server::AdminState;

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}

/// Authentication middleware
///
/// Passes every request through when no token is configured.
pub async fn auth_middleware(
    State(state): State<AdminState>,
    req: Request,
    next: Next,
) -> Result<Response, AdminError> {
    let Some(expected) = state.token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| constant_time_compare(expected, token));

    match authorized {
        Some(true) => Ok(next.run(req).await),
        Some(false) => {
            log::warn!("Authentication failure: invalid token for {}", req.uri().path());
            Err(AdminError::Authentication("Invalid token".to_string()))
        }
        None => {
            log::warn!(
                "Authentication failure: missing bearer token for {}",
                req.uri().path()
            );
            Err(AdminError::Authentication("Missing Authorization header".to_string()))
        }
    }
}
