//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind host, port).
    pub listener: ListenerConfig,

    /// Ordered backend list. Order defines the rotation sequence.
    pub backends: Vec<BackendConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Listening port.
    pub port: u16,
}

impl ListenerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.bind_host.contains(':') {
            format!("[{}]:{}", self.bind_host, self.port)
        } else {
            format!("{}:{}", self.bind_host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend URL with scheme and host (e.g., "http://127.0.0.1:3000").
    /// A path component becomes the prefix of every forwarded path.
    pub address: String,
}

impl BackendConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Delay between probes of the same backend, in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// How each backend is probed.
    pub probe: ProbeConfig,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 2_000,
            probe: ProbeConfig::default(),
            unhealthy_threshold: 1,
            healthy_threshold: 1,
        }
    }
}

/// Probe method.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum ProbeConfig {
    /// HTTP GET against `path`; 2xx and 3xx count as alive.
    Http {
        #[serde(default = "default_probe_path")]
        path: String,
    },
    /// Plain TCP connect to the backend's host and port.
    Tcp,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Http {
            path: default_probe_path(),
        }
    }
}

fn default_probe_path() -> String {
    "/health".to_string()
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for receiving the upstream response head, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [[backends]]
            address = "http://127.0.0.1:9001"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.backends, vec![BackendConfig::new("http://127.0.0.1:9001")]);
        assert!(config.health_check.enabled);
        assert_eq!(config.health_check.unhealthy_threshold, 1);
        assert_eq!(config.health_check.probe, ProbeConfig::Http { path: "/health".into() });
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn probe_method_is_tagged() {
        let config: HealthCheckConfig = toml::from_str(
            r#"
            interval_ms = 500
            probe = { method = "tcp" }
            "#,
        )
        .unwrap();
        assert_eq!(config.probe, ProbeConfig::Tcp);
        assert_eq!(config.interval(), Duration::from_millis(500));

        let config: HealthCheckConfig = toml::from_str(r#"probe = { method = "http" }"#).unwrap();
        assert_eq!(config.probe, ProbeConfig::Http { path: "/health".into() });
    }

    #[test]
    fn bind_address_brackets_ipv6() {
        let listener = ListenerConfig {
            bind_host: "::1".into(),
            port: 8080,
        };
        assert_eq!(listener.bind_address(), "[::1]:8080");
        assert_eq!(ListenerConfig::default().bind_address(), "0.0.0.0:8080");
    }
}
