//! Backend pool.
//!
//! # Responsibilities
//! - Build the ordered backend list from configuration
//! - Reject an empty pool
//! - Hand out shared references to selector and health tracker

use std::sync::Arc;
use std::time::Duration;

use crate::config::{validation::parse_backend_address, ConfigError, ProxyConfig, ValidationError};
use crate::load_balancer::backend::{HttpBackend, HttpClient};
use crate::load_balancer::Upstream;

/// Fixed, ordered set of upstreams. Index order is rotation order.
#[derive(Debug)]
pub struct Pool {
    backends: Vec<Arc<dyn Upstream>>,
}

impl Pool {
    /// Create a pool from already-built upstreams.
    pub fn new(backends: Vec<Arc<dyn Upstream>>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ValidationError::EmptyPool.into());
        }
        Ok(Self { backends })
    }

    /// Build one `HttpBackend` per configured address, in order.
    pub fn from_config(config: &ProxyConfig, client: HttpClient) -> Result<Self, ConfigError> {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let mut errors = Vec::new();
        let mut backends: Vec<Arc<dyn Upstream>> = Vec::with_capacity(config.backends.len());

        for backend in &config.backends {
            let url = match parse_backend_address(&backend.address) {
                Ok(url) => url,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            match HttpBackend::new(url, client.clone(), request_timeout) {
                Ok(b) => backends.push(Arc::new(b)),
                Err(e) => errors.push(ValidationError::InvalidAddress {
                    address: backend.address.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }
        Self::new(backends)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backends(&self) -> &[Arc<dyn Upstream>] {
        &self.backends
    }

    /// Number of backends currently marked alive.
    pub fn alive_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }
}
