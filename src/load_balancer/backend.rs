//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server reachable over HTTP
//! - Rewrite inbound requests to target that server
//! - Relay the upstream response, enforcing the request deadline
//! - Expose the liveness flag maintained by the health tracker

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::BoxError;
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::{header, HeaderValue, Request, Response};
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tokio::time::{self, Instant, Sleep};
use url::{Position, Url};

use crate::config::TimeoutConfig;
use crate::health::state::Liveness;
use crate::http::headers::strip_hop_by_hop;
use crate::load_balancer::Upstream;

/// Shared HTTP client used for forwarding and probing.
pub type HttpClient = Client<HttpConnector, Body>;

/// Build the pooled upstream client with the configured connect timeout.
pub fn build_client(timeouts: &TimeoutConfig) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Failure of a single forwarding attempt.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The TCP connection could not be established.
    #[error("upstream {backend} unreachable: {reason}")]
    UpstreamUnreachable { backend: String, reason: String },

    /// The response was not complete within the request deadline.
    #[error("upstream {backend} timed out after {timeout:?}")]
    UpstreamTimeout { backend: String, timeout: Duration },

    /// The upstream answered with something that is not valid HTTP.
    #[error("upstream {backend} protocol error: {reason}")]
    UpstreamProtocolError { backend: String, reason: String },

    /// The rewritten request target could not be built.
    #[error("cannot build upstream target: {0}")]
    InvalidTarget(String),
}

/// An upstream reached through the hyper client.
pub struct HttpBackend {
    address: Url,
    authority: Authority,
    host_header: HeaderValue,
    client: HttpClient,
    request_timeout: Duration,
    liveness: Liveness,
}

impl HttpBackend {
    /// Create a backend for a validated `http://host[:port][/base]` URL.
    pub fn new(
        address: Url,
        client: HttpClient,
        request_timeout: Duration,
    ) -> Result<Self, ForwardError> {
        let authority_str = &address[Position::BeforeHost..Position::AfterPort];
        let authority = Authority::from_str(authority_str)
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?;

        Ok(Self {
            address,
            authority,
            host_header,
            client,
            request_timeout,
            liveness: Liveness::new(),
        })
    }

    /// Map an inbound URI onto this backend.
    pub fn rewrite_uri(&self, original: &Uri) -> Result<Uri, ForwardError> {
        let path = join_path(self.address.path(), original.path());
        let query = merge_query(self.address.query(), original.query());
        let path_and_query = match query {
            Some(q) => format!("{}?{}", path, q),
            None => path,
        };

        let mut parts = original.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = Some(
            PathAndQuery::from_str(&path_and_query)
                .map_err(|e| ForwardError::InvalidTarget(e.to_string()))?,
        );
        Uri::from_parts(parts).map_err(|e| ForwardError::InvalidTarget(e.to_string()))
    }

    fn name(&self) -> String {
        self.address.as_str().trim_end_matches('/').to_string()
    }

    fn timed_out(&self) -> ForwardError {
        ForwardError::UpstreamTimeout {
            backend: self.name(),
            timeout: self.request_timeout,
        }
    }

    fn classify(&self, err: hyper_util::client::legacy::Error) -> ForwardError {
        if err.is_connect() {
            ForwardError::UpstreamUnreachable {
                backend: self.name(),
                reason: error_chain(&err),
            }
        } else {
            ForwardError::UpstreamProtocolError {
                backend: self.name(),
                reason: error_chain(&err),
            }
        }
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("address", &self.address.as_str())
            .field("alive", &self.liveness.is_alive())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl Upstream for HttpBackend {
    fn address(&self) -> &Url {
        &self.address
    }

    fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.rewrite_uri(&parts.uri)?;
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(header::HOST, self.host_header.clone());

        let deadline = Instant::now() + self.request_timeout;

        // Dropping the pending future on timeout aborts the upstream connection.
        let response = match time::timeout_at(
            deadline,
            self.client.request(Request::from_parts(parts, body)),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.classify(e)),
            Err(_) => return Err(self.timed_out()),
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        let body = DeadlineBody {
            inner: body,
            deadline: Box::pin(time::sleep_until(deadline)),
            backend: self.name(),
            timeout: self.request_timeout,
        };
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Upstream response body that fails once the request deadline passes.
///
/// The error aborts the client response; dropping the body closes the
/// upstream connection.
struct DeadlineBody {
    inner: Incoming,
    deadline: Pin<Box<Sleep>>,
    backend: String,
    timeout: Duration,
}

impl HttpBody for DeadlineBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = self.get_mut();
        if let Poll::Ready(frame) = Pin::new(&mut this.inner).poll_frame(cx) {
            return Poll::Ready(frame.map(|result| result.map_err(BoxError::from)));
        }
        if this.deadline.as_mut().poll(cx).is_ready() {
            let err = ForwardError::UpstreamTimeout {
                backend: this.backend.clone(),
                timeout: this.timeout,
            };
            return Poll::Ready(Some(Err(err.into())));
        }
        Poll::Pending
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Join two URL paths with exactly one slash between them.
pub fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Combine the backend's fixed query with the request query.
pub fn merge_query(base: Option<&str>, request: Option<&str>) -> Option<String> {
    match (base.filter(|q| !q.is_empty()), request.filter(|q| !q.is_empty())) {
        (Some(b), Some(r)) => Some(format!("{}&{}", b, r)),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
