//! In-memory upstream for selector and health tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use url::Url;

use crate::health::state::Liveness;
use crate::load_balancer::{ForwardError, Pool, Upstream};

/// Answers every request with its own address as the body.
#[derive(Debug)]
pub struct StubUpstream {
    address: Url,
    liveness: Liveness,
}

impl StubUpstream {
    pub fn new(host: &str) -> Self {
        Self {
            address: Url::parse(&format!("http://{}", host)).unwrap(),
            liveness: Liveness::new(),
        }
    }
}

#[async_trait]
impl Upstream for StubUpstream {
    fn address(&self) -> &Url {
        &self.address
    }

    fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    async fn forward(&self, _request: Request<Body>) -> Result<Response<Body>, ForwardError> {
        Ok(Response::new(Body::from(self.address.to_string())))
    }
}

/// Pool of stubs, one per host, in order.
pub fn stub_pool(hosts: &[&str]) -> Arc<Pool> {
    let backends = hosts
        .iter()
        .map(|h| Arc::new(StubUpstream::new(h)) as Arc<dyn Upstream>)
        .collect();
    Arc::new(Pool::new(backends).unwrap())
}
