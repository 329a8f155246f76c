//! Unified error type.

use crate::config::ConfigError;

/// The error type returned by veer's fallible startup operations.
///
/// Per-request failures (an unreachable backend, a timeout) are expressed as
/// gateway [`Response`](crate::Response) values, never as `Error`s. This type
/// surfaces the failures that stop the process from serving at all: invalid
/// configuration, binding to a port, or accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
