//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID + trace layers)
//!     → headers.rs (X-Forwarded-*, hop-by-hop stripping)
//!     → [selector picks backend, backend forwards]
//!     → response.rs (503/502 for proxy-side failures)
//!     → Send to client
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{HttpServer, ProxyFront};
