//! HTTP server setup and the proxy front.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Select a backend per request and forward to it
//! - Translate selection/forwarding failures to 503/502
//! - Run the health tracker alongside the listener
//! - Graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, HealthCheckConfig, ProxyConfig};
use crate::health::{probe, HealthPolicy, HealthTracker};
use crate::http::headers::set_forwarded_headers;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::ProxyError;
use crate::load_balancer::backend::{build_client, HttpClient};
use crate::load_balancer::{Pool, Selector};
use crate::observability::metrics;

/// Request entry point: select, forward, relay.
#[derive(Debug)]
pub struct ProxyFront {
    selector: Selector,
}

impl ProxyFront {
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Serve one request. Never fails; errors become 503/502 responses.
    pub async fn handle_request(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let request_id = request_id(&request).to_string();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let backend = match self.selector.next() {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(request_id = %request_id, method = %method, path = %path, "No healthy backends");
                metrics::record_no_healthy_backend();
                metrics::record_request(method.as_str(), 503, "none", start);
                return ProxyError::from(e).into_response();
            }
        };
        let backend_addr = backend.address().as_str().to_string();

        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            backend = %backend_addr,
            "Forwarding request"
        );

        match backend.forward(request).await {
            Ok(response) => {
                let status = response.status();
                tracing::info!(
                    request_id = %request_id,
                    backend = %backend_addr,
                    status = status.as_u16(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Request forwarded"
                );
                metrics::record_request(method.as_str(), status.as_u16(), &backend_addr, start);
                response
            }
            Err(e) => {
                let err = ProxyError::from(e);
                tracing::error!(
                    request_id = %request_id,
                    backend = %backend_addr,
                    error = %err,
                    "Upstream error"
                );
                metrics::record_request(method.as_str(), err.status().as_u16(), &backend_addr, start);
                err.into_response()
            }
        }
    }
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    front: Arc<ProxyFront>,
    client: HttpClient,
    health_config: HealthCheckConfig,
}

impl HttpServer {
    /// Validate `config` and build the pool, selector and router.
    pub fn new(config: &ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(config)?;

        let client = build_client(&config.timeouts);
        let pool = Arc::new(Pool::from_config(config, client.clone())?);
        let front = Arc::new(ProxyFront::new(Selector::new(pool)));
        let router = Self::build_router(front.clone());

        Ok(Self {
            router,
            front,
            client,
            health_config: config.health_check.clone(),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(front: Arc<ProxyFront>) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(front)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn front(&self) -> &Arc<ProxyFront> {
        &self.front
    }

    pub fn pool(&self) -> &Arc<Pool> {
        self.front.selector().pool()
    }

    /// Serve on `listener` until `shutdown` fires.
    ///
    /// The health tracker runs for exactly as long as the server.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool().len(),
            "HTTP server starting"
        );

        let tracker = if self.health_config.enabled {
            let probe = probe::from_config(&self.health_config.probe, self.client.clone());
            Some(HealthTracker::start(
                self.pool(),
                HealthPolicy::from(&self.health_config),
                probe,
            ))
        } else {
            tracing::info!("Active health checks disabled");
            None
        };

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        if let Some(tracker) = tracker {
            tracker.shutdown().await;
        }
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: every path and method is proxied.
async fn proxy_handler(
    State(front): State<Arc<ProxyFront>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    set_forwarded_headers(request.headers_mut(), peer.ip());
    front.handle_request(request).await
}
