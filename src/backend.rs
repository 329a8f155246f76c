//! Backend targets.
//!
//! A [`Target`] is the scheme and authority of one upstream service. Only
//! those two parts of the configured base URL matter: the proxy rewrites the
//! destination of each request and keeps the client's path and query as-is.

use std::fmt;

use http::uri::{Authority, Scheme, Uri};

use crate::config::ConfigError;

/// Which of the two backends a request is sent to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Side {
    /// The service that historically owns every route.
    Legacy,
    /// The replacement service receiving a share of migrated traffic.
    New,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::New    => "new",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, reachable HTTP backend: `scheme://host[:port]`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Target {
    scheme: Scheme,
    authority: Authority,
}

impl Target {
    /// Parses an absolute base URL such as `http://monolith:8080`.
    ///
    /// `name` is the configuration key the value came from; it only appears
    /// in the error. Any path on the base URL is ignored.
    pub fn parse(name: &'static str, raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidUrl {
            name,
            value: raw.to_owned(),
            reason: reason.to_owned(),
        };

        let uri: Uri = raw.trim().parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

        let scheme = uri.scheme().cloned().ok_or_else(|| invalid("missing scheme"))?;
        if scheme != Scheme::HTTP && scheme != Scheme::HTTPS {
            return Err(ConfigError::UnsupportedScheme { name, scheme: scheme.to_string() });
        }

        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        // Credentials are not forwarded and must not reach the logs.
        let authority: Authority = match authority.as_str().rsplit_once('@') {
            Some((_, host_port)) => host_port
                .parse()
                .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?,
            None => authority.clone(),
        };
        if authority.host().is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self { scheme, authority })
    }

    pub fn scheme(&self) -> &Scheme { &self.scheme }
    pub fn authority(&self) -> &Authority { &self.authority }

    /// Rebuilds `uri` so it points at this target, keeping path and query.
    pub(crate) fn rewrite(&self, uri: &Uri) -> Result<Uri, http::Error> {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// The legacy/new pair every request is routed between.
#[derive(Clone, Debug)]
pub struct Backends {
    pub legacy: Target,
    pub new: Target,
}

impl Backends {
    pub fn get(&self, side: Side) -> &Target {
        match side {
            Side::Legacy => &self.legacy,
            Side::New    => &self.new,
        }
    }
}
