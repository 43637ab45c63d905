//! Backend liveness state machine.
//!
//! # States
//! - Alive: backend receives traffic
//! - Dead: backend skipped by the selector
//!
//! # State Transitions
//! ```text
//! Alive → Dead:  consecutive failures >= unhealthy_threshold
//! Dead  → Alive: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - The alive flag is a lone atomic; readers never block
//! - Only the health tracker writes it; request outcomes never do
//! - Counters reset on the opposite outcome

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Consecutive-outcome thresholds for a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub unhealthy: u32,
    pub healthy: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            unhealthy: 1,
            healthy: 1,
        }
    }
}

/// A liveness change caused by a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Up,
    Down,
}

/// Alive flag plus the probe streak counters behind it.
#[derive(Debug)]
pub struct Liveness {
    alive: AtomicBool,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
}

impl Liveness {
    /// Backends start alive so traffic flows before the first probe completes.
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Force the flag. Returns the previous value.
    #[cfg(test)]
    pub(crate) fn set_alive(&self, alive: bool) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Fold one probe outcome into the streak counters.
    ///
    /// Returns the transition if the alive flag changed.
    pub fn record(&self, success: bool, thresholds: Thresholds) -> Option<Transition> {
        if success {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            if self.is_alive() {
                return None;
            }
            let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= thresholds.healthy {
                self.consecutive_successes.store(0, Ordering::Relaxed);
                self.alive.store(true, Ordering::Release);
                return Some(Transition::Up);
            }
        } else {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            if !self.is_alive() {
                return None;
            }
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= thresholds.unhealthy {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.alive.store(false, Ordering::Release);
                return Some(Transition::Down);
            }
        }
        None
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
