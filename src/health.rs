//! Liveness endpoint.
//!
//! `GET /health` answers `200 {"status":true}` from the proxy process alone.
//! It never routes, never rolls the dice and never contacts a backend, so a
//! failing backend cannot make the proxy look dead and get it restarted.

use crate::response::Response;

pub const PATH: &str = "/health";

const BODY: &[u8] = br#"{"status":true}"#;

/// Always `200 OK`, `application/json`, `{"status":true}`.
pub fn liveness() -> Response {
    Response::json(BODY)
}
