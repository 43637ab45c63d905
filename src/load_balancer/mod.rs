//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request accepted
//!     → round_robin.rs (Selector: next live backend from the cursor)
//!     → pool.rs (fixed, ordered backend list)
//!     → backend.rs (rewrite + forward to the chosen upstream)
//!     → Return upstream response or error
//! ```
//!
//! # Design Decisions
//! - The pool is fixed at startup; its order is the rotation order
//! - The rotation cursor is the only synchronisation point on the request path
//! - Dead backends are skipped, never removed
//! - Selection and forwarding only see `dyn Upstream`

pub mod backend;
pub mod pool;
pub mod round_robin;

#[cfg(test)]
pub(crate) mod stub;

use std::fmt::Debug;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use url::Url;

use crate::health::state::Liveness;

pub use backend::{ForwardError, HttpBackend};
pub use pool::Pool;
pub use round_robin::{NoHealthyBackend, Selector};

/// Capability set of one upstream target.
///
/// Decorators (for example a circuit breaker) can wrap another `Upstream`
/// and override `is_alive` or `forward` without touching selection.
#[async_trait]
pub trait Upstream: Send + Sync + Debug {
    /// Immutable identity, used for logging, metrics and request rewriting.
    fn address(&self) -> &Url;

    /// Liveness flag written by the health tracker.
    fn liveness(&self) -> &Liveness;

    /// Most recent liveness determination. Never blocks.
    fn is_alive(&self) -> bool {
        self.liveness().is_alive()
    }

    /// Send `request` to this upstream and relay its response.
    ///
    /// Must not mutate liveness.
    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError>;
}
