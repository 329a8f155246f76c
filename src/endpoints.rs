//! Endpoints answered by veer itself.
//!
//! One radix tree per HTTP method. A request that matches a local endpoint
//! never reaches the routing decision or either backend; everything else
//! falls through to the proxy.

use std::collections::HashMap;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::health;
use crate::response::Response;

/// A local endpoint: a fixed response that needs nothing from the request.
pub type Endpoint = fn() -> Response;

/// Local endpoint table. Build once at startup.
pub struct Endpoints {
    routes: HashMap<Method, MatchitRouter<Endpoint>>,
}

impl Endpoints {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// The standard set: `GET /health`.
    pub fn standard() -> Self {
        Self::new().on(Method::GET, health::PATH, health::liveness)
    }

    /// Registers an endpoint for a method + path pair. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or is registered twice for the
    /// same method. Both are startup mistakes.
    pub fn on(mut self, method: Method, path: &str, endpoint: Endpoint) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, endpoint)
            .unwrap_or_else(|e| panic!("invalid endpoint `{path}`: {e}"));
        self
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<Endpoint> {
        let tree = self.routes.get(method)?;
        tree.at(path).ok().map(|matched| *matched.value)
    }
}

impl Default for Endpoints {
    fn default() -> Self { Self::new() }
}
