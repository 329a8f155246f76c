//! Outgoing HTTP responses.
//!
//! Two kinds of response leave the proxy: ones relayed from a backend, whose
//! bodies stream straight through, and small ones veer builds itself (health
//! checks, gateway errors). Both share the boxed [`Body`] type so the server
//! hands hyper a single concrete response type.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};

/// Body of every request and response passing through veer.
pub type Body = UnsyncBoxBody<Bytes, hyper::Error>;

/// Wraps an in-memory buffer as a [`Body`].
pub fn full(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed_unsync()
}

/// A response veer builds itself.
///
/// ```rust
/// use veer::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"status":true}"#.to_vec());
/// Response::text(StatusCode::BAD_GATEWAY, "Bad Gateway");
/// ```
pub struct Response {
    inner: http::Response<Body>,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::with_type(StatusCode::OK, "application/json", full(body))
    }

    /// `text/plain; charset=utf-8` with the given status.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_type(status, "text/plain; charset=utf-8", full(body.into()))
    }

    fn with_type(status: StatusCode, content_type: &'static str, body: Body) -> Self {
        let mut inner = http::Response::new(body);
        *inner.status_mut() = status;
        inner
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self { inner }
    }

    pub fn into_inner(self) -> http::Response<Body> { self.inner }
}
