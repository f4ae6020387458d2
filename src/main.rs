//! TCP Intercept Command Line Tool
//!
//! This binary is the command-line interface for the TCP intercept relay.

use clap::Parser;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;

use tcp_intercept::admin::{start_admin_server, AdminServerConfig};
use tcp_intercept::common::{init_logger, Result};
use tcp_intercept::config::{ConfigValues, Delimiter, ProxyConfig};
use tcp_intercept::proxy::{FailurePolicy, HandlerKind, ProxyServer};
use tcp_intercept::{APP_NAME, VERSION};

/// TCP Intercept: transparent TCP relay with frame rewriting and byte injection
///
/// Every option can also be set in a JSON config file or through
/// `TCP_INTERCEPT_*` environment variables. Command line wins over
/// environment, which wins over the file.
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Listen address [default: 127.0.0.1:9000]
    #[arg(short, long)]
    listen: Option<String>,

    /// Remote target address [default: 127.0.0.1:9001]
    #[arg(short, long)]
    target: Option<String>,

    /// Frame delimiter: a single character, \n, \r, \t, \0, \xNN or 0xNN [default: \n]
    #[arg(short, long)]
    delimiter: Option<Delimiter>,

    /// What a relay failure tears down (global, session) [default: global]
    #[arg(long)]
    failure_policy: Option<FailurePolicy>,

    /// Handler for frames read from the client (passthrough, uppercase, lowercase, drop, log)
    #[arg(long)]
    client_handler: Option<HandlerKind>,

    /// Handler for frames read from the remote (passthrough, uppercase, lowercase, drop, log)
    #[arg(long)]
    remote_handler: Option<HandlerKind>,

    /// Log level (error, warn, info, debug, trace) [default: info]
    #[arg(long)]
    log_level: Option<String>,

    /// Load configuration from a JSON file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Admin API listen address; the API is disabled when unset
    #[arg(long)]
    admin_listen: Option<SocketAddr>,

    /// Bearer token required by the admin API
    #[arg(long)]
    admin_token: Option<String>,
}

impl Args {
    fn config_values(&self) -> ConfigValues {
        ConfigValues {
            listen: self.listen.clone(),
            target: self.target.clone(),
            delimiter: self.delimiter,
            failure_policy: self.failure_policy,
            client_handler: self.client_handler,
            remote_handler: self.remote_handler,
            log_level: self.log_level.clone(),
            admin_listen: self.admin_listen,
            admin_token: self.admin_token.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match ProxyConfig::load(args.config_file.as_deref(), args.config_values()) {
        Ok(config) => config,
        Err(e) => {
            // The logger level comes from the config, so fall back to the CLI value
            init_logger(args.log_level.as_deref().unwrap_or("info"));
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    init_logger(config.log_level());
    info!("Starting {} v{}", APP_NAME, VERSION);

    for warning in config.check_warnings() {
        warn!("{}", warning);
    }

    info!("Listen address: {} (from {})", config.listen(), config.source("listen"));
    info!("Target service: {} (from {})", config.target(), config.source("target"));
    info!(
        "Frame delimiter: {}, failure policy: {}",
        Delimiter(config.delimiter()),
        config.failure_policy()
    );
    info!(
        "Handlers: client={}, remote={}",
        config.client_handler(),
        config.remote_handler()
    );

    let proxy = ProxyServer::from_config(&config);
    proxy.start().await?;

    if let Some(admin) = AdminServerConfig::from_config(&config) {
        let admin_proxy = proxy.clone();
        tokio::spawn(async move {
            if let Err(e) = start_admin_server(admin, admin_proxy).await {
                error!("Admin API server failed: {}", e);
            }
        });
    }

    info!("Proxy service ready, press Ctrl+C to stop");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        }
        _ = proxy.wait() => {
            warn!("Proxy stopped");
        }
    }

    proxy.stop();
    Ok(())
}
