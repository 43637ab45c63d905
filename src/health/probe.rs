//! Health probes.
//!
//! # Responsibilities
//! - Define the probe capability used by the health tracker
//! - HTTP probe: GET a path, 2xx/3xx means alive
//! - TCP probe: a completed connect means alive
//!
//! Timeouts are applied by the caller, not the probe.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use thiserror::Error;
use tokio::net::TcpStream;
use url::{Position, Url};

use crate::config::ProbeConfig;
use crate::load_balancer::backend::{join_path, HttpClient};

/// Why a probe judged a backend dead.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection error: {0}")]
    Connect(String),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("probe timed out")]
    Timeout,

    #[error("invalid probe target: {0}")]
    Target(String),
}

/// A single liveness check against one backend.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short label for logs.
    fn kind(&self) -> &'static str;

    async fn check(&self, target: &Url) -> Result<(), ProbeError>;
}

/// Build the probe selected in configuration.
pub fn from_config(config: &ProbeConfig, client: HttpClient) -> Arc<dyn Probe> {
    match config {
        ProbeConfig::Http { path } => Arc::new(HttpProbe::new(client, path.clone())),
        ProbeConfig::Tcp => Arc::new(TcpProbe),
    }
}

/// `GET <backend base path + path>`.
pub struct HttpProbe {
    client: HttpClient,
    path: String,
}

impl HttpProbe {
    pub fn new(client: HttpClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn check(&self, target: &Url) -> Result<(), ProbeError> {
        let uri = format!(
            "{}{}",
            &target[..Position::AfterPort],
            join_path(target.path(), &self.path)
        );
        let request = Request::get(uri)
            .header(header::USER_AGENT, "lb-proxy-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Target(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(ProbeError::Status(status))
        }
    }
}

/// Connect to `host:port` and hang up.
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    fn kind(&self) -> &'static str {
        "tcp"
    }

    async fn check(&self, target: &Url) -> Result<(), ProbeError> {
        let host = target
            .host_str()
            .ok_or_else(|| ProbeError::Target("missing host".to_string()))?;
        let port = target
            .port_or_known_default()
            .ok_or_else(|| ProbeError::Target("missing port".to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');

        TcpStream::connect((host, port))
            .await
            .map(drop)
            .map_err(|e| ProbeError::Connect(e.to_string()))
    }
}
