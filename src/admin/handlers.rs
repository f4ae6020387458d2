//! Admin API Request Handlers
//!
//! This module implements all HTTP request handlers for the admin API.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;

use crate::admin::error::AdminResult;
use crate::admin::server::AdminState;
use crate::admin::types::{InjectResponse, ProxyStatus};
use crate::common::escape_bytes;
use crate::proxy::Direction;

/// Health check endpoint (no auth required)
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Current proxy state
pub async fn get_status(State(state): State<AdminState>) -> Json<ProxyStatus> {
    let proxy = &state.proxy;
    Json(ProxyStatus {
        listen: proxy.listen_addr().to_string(),
        local_addr: proxy.local_addr().map(|addr| addr.to_string()),
        target: proxy.target_addr().to_string(),
        delimiter: escape_bytes(&[proxy.delimiter()]),
        failure_policy: proxy.failure_policy(),
        stopped: proxy.stopped(),
        pending_client: proxy.pending(Direction::Client),
        pending_remote: proxy.pending(Direction::Remote),
    })
}

/// Queue the request body for injection
pub async fn inject(
    State(state): State<AdminState>,
    Path(direction): Path<String>,
    body: Bytes,
) -> AdminResult<(StatusCode, Json<InjectResponse>)> {
    let direction: Direction = direction.parse()?;

    state.proxy.inject(direction, &body);
    log::info!("Admin API injected {} {} bytes", body.len(), direction);

    Ok((
        StatusCode::ACCEPTED,
        Json(InjectResponse {
            direction: direction.to_string(),
            queued: body.len(),
            pending: state.proxy.pending(direction),
        }),
    ))
}

/// Drop everything queued on a direction
pub async fn clear_inject(
    State(state): State<AdminState>,
    Path(direction): Path<String>,
) -> AdminResult<StatusCode> {
    let direction: Direction = direction.parse()?;

    state.proxy.clear_inject(direction);
    log::info!("Admin API cleared pending {} injection", direction);

    Ok(StatusCode::NO_CONTENT)
}

/// Stop the proxy
pub async fn stop(State(state): State<AdminState>) -> impl IntoResponse {
    log::info!("Admin API requested proxy stop");
    state.proxy.stop();
    Json(serde_json::json!({ "stopped": state.proxy.stopped() }))
}
