//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Per-backend periodic timer
//!     → probe.rs (HTTP GET or TCP connect, with timeout)
//!     → Update state.rs
//!
//! State machine (state.rs):
//!     Alive ←→ Dead
//!     Optional thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Health is determined only by probes; request failures never flip it
//! - State transitions require consecutive successes/failures
//! - Health state is per-backend, not per-pool

pub mod active;
pub mod probe;
pub mod state;

pub use active::{HealthPolicy, HealthTracker};
pub use probe::{HttpProbe, Probe, ProbeError, TcpProbe};
pub use state::{Liveness, Thresholds, Transition};
