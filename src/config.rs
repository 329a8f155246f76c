//! Startup configuration.
//!
//! Everything the proxy needs is read once, validated, and frozen into a
//! [`Config`] before the listener is bound. A bad value stops the process;
//! nothing here is re-read while serving.
//!
//! | Variable | Required | Default |
//! |---|---|---|
//! | `MONOLITH_URL` | yes | |
//! | `MOVIES_SERVICE_URL` | yes | |
//! | `PORT` | no | `8000` |
//! | `GRADUAL_MIGRATION` | no | off (only `"true"` turns it on) |
//! | `MOVIES_MIGRATION_PERCENT` | no | `100` when migration is on |
//! | `BACKEND_TIMEOUT_SECS` | no | `30` |

use std::net::SocketAddr;
use std::time::Duration;

use crate::backend::{Backends, Target};
use crate::policy::MigrationPolicy;

pub const LEGACY_URL_VAR: &str = "MONOLITH_URL";
pub const NEW_URL_VAR: &str = "MOVIES_SERVICE_URL";
pub const PORT_VAR: &str = "PORT";
pub const MIGRATION_VAR: &str = "GRADUAL_MIGRATION";
pub const PERCENT_VAR: &str = "MOVIES_MIGRATION_PERCENT";
pub const TIMEOUT_VAR: &str = "BACKEND_TIMEOUT_SECS";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PERCENT: u8 = 100;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Invalid or missing startup configuration. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {name} `{value}`: {reason}")]
    InvalidUrl { name: &'static str, value: String, reason: String },

    #[error("{name} must use http or https, got `{scheme}`")]
    UnsupportedScheme { name: &'static str, scheme: String },

    #[error("MOVIES_MIGRATION_PERCENT must be an integer between 0 and 100, got: {0}")]
    InvalidPercent(String),

    #[error("PORT must be a port number, got: {0}")]
    InvalidPort(String),

    #[error("BACKEND_TIMEOUT_SECS must be a positive number of seconds, got: {0}")]
    InvalidTimeout(String),
}

/// The immutable startup snapshot.
#[derive(Clone, Debug)]
pub struct Config {
    pub backends: Backends,
    pub policy: MigrationPolicy,
    pub listen: SocketAddr,
    pub backend_timeout: Duration,
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let legacy = get(LEGACY_URL_VAR).ok_or(ConfigError::Missing(LEGACY_URL_VAR))?;
        let new = get(NEW_URL_VAR).ok_or(ConfigError::Missing(NEW_URL_VAR))?;
        let backends = Backends {
            legacy: Target::parse(LEGACY_URL_VAR, &legacy)?,
            new: Target::parse(NEW_URL_VAR, &new)?,
        };

        let port = match get(PORT_VAR) {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
        };

        // The percentage is only consulted when migration is switched on.
        let policy = if get(MIGRATION_VAR).as_deref() == Some("true") {
            let percent = match get(PERCENT_VAR) {
                None => DEFAULT_PERCENT,
                Some(raw) => parse_percent(&raw)?,
            };
            MigrationPolicy::enabled(percent)?
        } else {
            MigrationPolicy::disabled()
        };

        let backend_timeout = match get(TIMEOUT_VAR) {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
        };

        Ok(Self {
            backends,
            policy,
            listen: SocketAddr::from(([0, 0, 0, 0], port)),
            backend_timeout,
        })
    }
}

/// Signed decimal with an optional `+`/`-` sign and no surrounding
/// whitespace, so `-0` and `+5` are accepted and `" 5"` is not.
fn parse_percent(raw: &str) -> Result<u8, ConfigError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|p| u8::try_from(p).ok())
        .filter(|p| *p <= 100)
        .ok_or_else(|| ConfigError::InvalidPercent(raw.to_owned()))
}
