//! Forwarding a request to its chosen backend.
//!
//! The forwarder is the trust boundary. On the way out it points the request
//! at the backend, keeps method, path, query and body exactly as received,
//! and drops headers that describe the client-facing hop: `X-Forwarded-For`,
//! `X-Real-IP`, `Host` and the hop-by-hop set. It adds no forwarding headers
//! of its own.
//!
//! On the way back the backend's status, headers and body are relayed as
//! received, minus hop-by-hop headers, and the body streams through without
//! buffering. The proxy never judges whether a backend response makes sense.
//!
//! A backend that cannot be reached, or that does not produce a response head
//! within the deadline, becomes a `502` or `504` for this request only. There
//! is no retry and no fallback to the other backend.

use std::time::Duration;

use http::header::{CONNECTION, HOST, HeaderMap, HeaderName};
use http::{StatusCode, Version};
use http_body_util::BodyExt;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::backend::Target;
use crate::response::{Body, Response};

/// Trust-boundary headers removed from every outbound request.
const CLIENT_HOP: [&str; 2] = ["x-forwarded-for", "x-real-ip"];

/// RFC 9110 §7.6.1 connection-specific headers, plus the legacy
/// `proxy-connection`.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Why a forward produced no backend response.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("backend request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("cannot address backend: {0}")]
    InvalidTarget(#[from] http::Error),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(_) | Self::InvalidTarget(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// The gateway error the client sees.
    pub fn into_response(self) -> Response {
        let status = self.status();
        Response::text(status, status.canonical_reason().unwrap_or("Bad Gateway"))
    }
}

type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Pooled HTTP client with a per-request deadline.
///
/// Holds no per-request state. One instance serves every request task.
#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client, timeout }
    }

    /// Sends `req` to `target` and returns the backend's response head with
    /// its body still streaming.
    ///
    /// The deadline covers connecting and receiving the response head.
    /// Dropping the returned future (for instance because the client went
    /// away) aborts the backend call.
    pub async fn forward(
        &self,
        req: http::Request<Body>,
        target: &Target,
    ) -> Result<http::Response<Body>, ForwardError> {
        let req = outbound(req, target)?;
        debug!(uri = %req.uri(), "sending to backend");

        let res = match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(res) => res?,
            Err(_) => return Err(ForwardError::Timeout(self.timeout)),
        };

        Ok(inbound(res))
    }
}

/// Rewrites a client request into the request sent to `target`.
pub(crate) fn outbound(
    req: http::Request<Body>,
    target: &Target,
) -> Result<http::Request<Body>, http::Error> {
    let (mut parts, body) = req.into_parts();

    parts.uri = target.rewrite(&parts.uri)?;
    // Backend connections are HTTP/1.1 whatever the client spoke.
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);
    for name in CLIENT_HOP {
        parts.headers.remove(name);
    }
    // The client fills Host in from the rewritten authority.
    parts.headers.remove(HOST);

    Ok(http::Request::from_parts(parts, body))
}

/// Converts the backend's response into the one relayed to the client.
pub(crate) fn inbound<B>(res: http::Response<B>) -> http::Response<Body>
where
    B: hyper::body::Body<Data = bytes::Bytes, Error = hyper::Error> + Send + 'static,
{
    let (mut parts, body) = res.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    http::Response::from_parts(parts, body.boxed_unsync())
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are hop-by-hop too.
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
