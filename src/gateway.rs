//! The request pipeline: local endpoint, or decide and forward.

use std::time::Instant;

use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::{info, warn};

use crate::config::Config;
use crate::endpoints::Endpoints;
use crate::forward::Forwarder;
use crate::response::Body;
use crate::routing::Splitter;

/// Everything a request needs, built once from the startup [`Config`] and
/// shared read-only by every connection task.
pub struct Gateway {
    endpoints: Endpoints,
    splitter: Splitter,
    forwarder: Forwarder,
}

impl Gateway {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            Endpoints::standard(),
            Splitter::new(config.backends.clone(), config.policy),
            Forwarder::new(config.backend_timeout),
        )
    }

    pub fn from_parts(endpoints: Endpoints, splitter: Splitter, forwarder: Forwarder) -> Self {
        Self { endpoints, splitter, forwarder }
    }

    /// Produces the response for one request. Never fails: backend trouble
    /// comes back as a gateway status.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Body>
    where
        B: hyper::body::Body<Data = Bytes, Error = hyper::Error> + Send + 'static,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        if let Some(endpoint) = self.endpoints.lookup(&method, &path) {
            return endpoint().into_inner();
        }

        let decision = self.splitter.decide(&method, &path);
        let target = self.splitter.target(decision.side);
        info!(
            %method,
            %path,
            backend = %decision.side,
            target = %target,
            reason = %decision.reason,
            "routing request"
        );

        let started = Instant::now();
        let req = req.map(|body| body.boxed_unsync());
        match self.forwarder.forward(req, target).await {
            Ok(res) => {
                info!(
                    %method,
                    %path,
                    backend = %decision.side,
                    status = res.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "backend responded"
                );
                res
            }
            Err(e) => {
                warn!(
                    %method,
                    %path,
                    backend = %decision.side,
                    status = e.status().as_u16(),
                    "gateway error: {e}"
                );
                e.into_response().into_inner()
            }
        }
    }
}
