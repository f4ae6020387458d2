//! Admin HTTP Server Module
//!
//! This module sets up the HTTP server for the admin API using axum.

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    Router,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::admin::auth::auth_middleware;
use crate::admin::error::{AdminError, AdminResult};
use crate::admin::handlers;
use crate::config::ProxyConfig;
use crate::proxy::ProxyServer;

/// Admin server configuration
#[derive(Debug, Clone)]
pub struct AdminServerConfig {
    /// Listen address for admin API
    pub listen_addr: SocketAddr,

    /// Bearer token required on `/api` routes
    pub token: Option<String>,
}

impl AdminServerConfig {
    /// Admin settings from the proxy configuration, if the API is enabled
    pub fn from_config(config: &ProxyConfig) -> Option<Self> {
        config.admin_listen().map(|listen_addr| Self {
            listen_addr,
            token: config.admin_token().map(str::to_string),
        })
    }
}

/// State shared by all admin handlers
#[derive(Debug, Clone)]
pub struct AdminState {
    /// Proxy under control
    pub proxy: ProxyServer,
    /// Expected bearer token
    pub token: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(proxy: ProxyServer, token: Option<&str>) -> Self {
        Self {
            proxy,
            token: token.map(Arc::from),
        }
    }
}

/// Start the admin HTTP server
///
/// Serves until the proxy stops.
pub async fn start_admin_server(config: AdminServerConfig, proxy: ProxyServer) -> AdminResult<()> {
    let state = AdminState::new(proxy.clone(), config.token.as_deref());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    log::info!("Admin API server listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { proxy.wait().await })
        .await
        .map_err(|e| AdminError::Internal(e.to_string()))?;

    log::info!("Admin API server stopped");
    Ok(())
}

/// Build the application router with all routes
pub fn build_router(state: AdminState) -> Router {
    let api_router = Router::new()
        .route("/status", get(handlers::get_status))
        .route(
            "/inject/:direction",
            post(handlers::inject).delete(handlers::clear_inject),
        )
        .route("/stop", post(handlers::stop))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
}
