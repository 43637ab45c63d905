//! Round-robin HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                  LB PROXY                     │
//!   Client Request       │  ┌──────────┐    ┌──────────┐    ┌─────────┐  │
//!   ─────────────────────┼─▶│  http    │───▶│ selector │───▶│ backend │──┼──▶ Upstream
//!                        │  │ server   │    │ (cursor) │    │ forward │  │
//!   Client Response      │  │          │    └────┬─────┘    │         │  │
//!   ◀────────────────────┼──│          │◀────────┼──────────│         │◀─┼─── Upstream
//!                        │  └──────────┘         │ reads    └─────────┘  │
//!                        │                  ┌────┴─────┐                 │
//!                        │                  │ liveness │◀── health       │
//!                        │                  │  flags   │    tracker ─────┼──▶ probes
//!                        │                  └──────────┘                 │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use lb_proxy::config::{
    load_config, read_config, validate_config, BackendConfig, ConfigError, ProxyConfig,
};
use lb_proxy::observability::{logging, metrics};
use lb_proxy::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "lb-proxy")]
#[command(about = "Round-robin HTTP load balancer with active health checks", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend URL, repeatable. Replaces the config file's backend list.
    #[arg(short, long = "backend", value_name = "URL")]
    backends: Vec<String>,

    /// Log filter used when RUST_LOG is unset (e.g. "debug").
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Merge the config file with command-line overrides and validate.
    fn resolve_config(self) -> Result<ProxyConfig, ConfigError> {
        if !self.has_overrides() {
            if let Some(path) = &self.config {
                return load_config(path);
            }
        }

        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };

        if !self.backends.is_empty() {
            config.backends = self.backends.into_iter().map(BackendConfig::new).collect();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        validate_config(&config)?;
        Ok(config)
    }

    fn has_overrides(&self) -> bool {
        !self.backends.is_empty() || self.port.is_some() || self.log_level.is_some()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse()
        .resolve_config()
        .map_err(|e| format!("configuration error: {}", e))?;

    logging::init_logging(&config.observability)?;

    tracing::info!("lb-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.listener.port,
        backends = ?config.backends.iter().map(|b| b.address.as_str()).collect::<Vec<_>>(),
        health_checks = config.health_check.enabled,
        "Configuration loaded"
    );

    let server = HttpServer::new(&config)?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
