//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): latency by method, backend
//! - `proxy_backend_health` (gauge): 1=alive, 0=dead
//! - `proxy_no_healthy_backend_total` (counter): requests refused with 503

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
///
/// Must run inside a Tokio runtime. Failure is logged, not fatal.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("proxy_requests_total", &labels).increment(1);

    let latency_labels = [("method", method.to_string()), ("backend", backend.to_string())];
    histogram!("proxy_request_duration_seconds", &latency_labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record a request refused because every backend is dead.
pub fn record_no_healthy_backend() {
    counter!("proxy_no_healthy_backend_total").increment(1);
}

/// Publish the current liveness of one backend.
pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("proxy_backend_health", "backend" => backend.to_string()).set(if alive {
        1.0
    } else {
        0.0
    });
}
