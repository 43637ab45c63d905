//! Mapping of proxy failures to client responses.
//!
//! # Design Decisions
//! - No live backend → 503 Service Unavailable, nothing sent upstream
//! - Any transport-level forwarding failure → 502 Bad Gateway
//! - Upstream responses, including 5xx, are never rewritten

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::load_balancer::{ForwardError, NoHealthyBackend};

/// Runtime error contained at the proxy front.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    NoHealthyBackend(#[from] NoHealthyBackend),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Forward(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let message = match &self {
            ProxyError::NoHealthyBackend(_) => "No healthy backends",
            ProxyError::Forward(_) => "Upstream request failed",
        };
        (self.status(), message).into_response()
    }
}
