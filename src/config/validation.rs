//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate backend addresses (scheme, host)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend pool is empty")]
    EmptyPool,

    #[error("invalid backend address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("backend {address:?} uses unsupported scheme {scheme:?} (only http)")]
    UnsupportedScheme { address: String, scheme: String },

    #[error("listener port must be between 1 and 65535")]
    InvalidPort,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Parse a configured backend address into its URL.
pub fn parse_backend_address(address: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(address).map_err(|e| ValidationError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme {
            address: address.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidAddress {
            address: address.to_string(),
            reason: "missing host".to_string(),
        });
    }
    if url.fragment().is_some() {
        return Err(ValidationError::InvalidAddress {
            address: address.to_string(),
            reason: "fragments are not allowed".to_string(),
        });
    }

    Ok(url)
}

/// Check every semantic rule and collect all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::EmptyPool);
    }
    for backend in &config.backends {
        if let Err(e) = parse_backend_address(&backend.address) {
            errors.push(e);
        }
    }

    let health = &config.health_check;
    if health.enabled {
        if health.interval_ms == 0 {
            errors.push(ValidationError::Zero { field: "health_check.interval_ms" });
        }
        if health.timeout_ms == 0 {
            errors.push(ValidationError::Zero { field: "health_check.timeout_ms" });
        }
        if health.unhealthy_threshold == 0 {
            errors.push(ValidationError::Zero { field: "health_check.unhealthy_threshold" });
        }
        if health.healthy_threshold == 0 {
            errors.push(ValidationError::Zero { field: "health_check.healthy_threshold" });
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn config_with(backends: &[&str]) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.backends = backends.iter().map(|a| BackendConfig::new(*a)).collect();
        config
    }

    #[test]
    fn valid_config_passes() {
        let config = config_with(&["http://127.0.0.1:9001", "http://backend.internal/api"]);
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn empty_pool_is_rejected() {
        let errors = validate_config(&ProxyConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyPool]);
    }

    #[test]
    fn collects_every_error() {
        let mut config = config_with(&["not a url", "https://secure.example.com", "http://ok:1"]);
        config.listener.port = 0;
        config.health_check.interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidPort));
        assert!(errors.contains(&ValidationError::Zero { field: "health_check.interval_ms" }));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidAddress { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnsupportedScheme { scheme, .. } if scheme == "https")));
    }

    #[test]
    fn disabled_health_check_skips_its_rules() {
        let mut config = config_with(&["http://127.0.0.1:9001"]);
        config.health_check.enabled = false;
        config.health_check.timeout_ms = 0;
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn parses_backend_with_path() {
        let url = parse_backend_address("http://10.0.0.1:8000/base").unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.1"));
        assert_eq!(url.port(), Some(8000));
        assert_eq!(url.path(), "/base");
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = config_with(&["http://127.0.0.1:9001"]);
        config.observability.metrics_address = "nope".into();
        assert_eq!(validate_config(&config), Ok(()));

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidMetricsAddress("nope".into())])
        );
    }
}
