//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend, off the request path
//! - Update backend liveness based on results
//! - Report liveness transitions

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{Probe, ProbeError};
use crate::health::state::{Thresholds, Transition};
use crate::load_balancer::{Pool, Upstream};
use crate::observability::metrics;

/// Timing and threshold settings for the probe loop.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub thresholds: Thresholds,
}

impl From<&HealthCheckConfig> for HealthPolicy {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
            thresholds: Thresholds {
                unhealthy: config.unhealthy_threshold,
                healthy: config.healthy_threshold,
            },
        }
    }
}

/// Background prober. One task per backend so a hung backend only
/// delays its own checks.
pub struct HealthTracker {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl HealthTracker {
    /// Spawn the probe loops. Must be called within a Tokio runtime.
    pub fn start(pool: &Pool, policy: HealthPolicy, probe: Arc<dyn Probe>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::info!(
            backends = pool.len(),
            probe = probe.kind(),
            interval = ?policy.interval,
            timeout = ?policy.timeout,
            "Health tracker starting"
        );

        let tasks = pool
            .backends()
            .iter()
            .map(|backend| {
                tokio::spawn(probe_loop(
                    backend.clone(),
                    probe.clone(),
                    policy,
                    stop_rx.clone(),
                ))
            })
            .collect();

        Self { stop_tx, tasks }
    }

    /// Halt all future probing. Safe to call more than once.
    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            tracing::info!("Health tracker stopping");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Stop and wait for every probe loop to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Health probe task failed");
            }
        }
    }
}

impl Drop for HealthTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn probe_loop(
    backend: Arc<dyn Upstream>,
    probe: Arc<dyn Probe>,
    policy: HealthPolicy,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.changed() => break,
        }

        let outcome = tokio::select! {
            result = time::timeout(policy.timeout, probe.check(backend.address())) => {
                result.unwrap_or(Err(ProbeError::Timeout))
            }
            _ = stop.changed() => break,
        };

        apply_outcome(backend.as_ref(), outcome, policy.thresholds);
    }

    tracing::debug!(backend = %backend.address(), "Health probe loop exited");
}

fn apply_outcome(backend: &dyn Upstream, outcome: Result<(), ProbeError>, thresholds: Thresholds) {
    let address = backend.address();

    if let Err(e) = &outcome {
        tracing::debug!(backend = %address, error = %e, "Health probe failed");
    }

    match backend.liveness().record(outcome.is_ok(), thresholds) {
        Some(Transition::Down) => {
            tracing::warn!(backend = %address, "Backend marked dead");
        }
        Some(Transition::Up) => {
            tracing::info!(backend = %address, "Backend marked alive");
        }
        None => {}
    }

    metrics::record_backend_health(address.as_str(), backend.is_alive());
}
