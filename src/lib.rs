//! # veer
//!
//! A reverse proxy that moves a route from a legacy backend to a new one a
//! slice at a time.
//!
//! Every request goes to the legacy backend except `GET /api/movies`, which,
//! while gradual migration is enabled, goes to the new backend with the
//! configured probability. Raise the percentage to shift more traffic; set it
//! to zero, or switch migration off, to roll back. Clients never see a route
//! change.
//!
//! ```text
//! client ─▶ Server ─▶ Gateway ─┬─ /health ──────────────▶ {"status":true}
//!                              └─ Splitter ─▶ Forwarder ─▶ legacy | new
//! ```
//!
//! - [`Splitter`] decides. Pure: method, path, policy and one dice roll.
//! - [`Forwarder`] rewrites the destination, scrubs client-hop headers and
//!   streams the exchange. Backend failures become `502`/`504`.
//! - [`Server`] accepts connections, one task each, and shuts down gracefully.
//!
//! TLS termination, rate limiting and body-size limits belong to whatever
//! sits in front of veer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use veer::{Config, Gateway, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), veer::Error> {
//!     let config = Config::from_env()?;
//!     Server::bind(config.listen).serve(Gateway::new(&config)).await
//! }
//! ```

mod error;
mod response;
mod server;

pub mod backend;
pub mod config;
pub mod endpoints;
pub mod forward;
pub mod gateway;
pub mod health;
pub mod policy;
pub mod routing;

pub use backend::{Backends, Side, Target};
pub use config::{Config, ConfigError};
pub use endpoints::{Endpoint, Endpoints};
pub use error::Error;
pub use forward::{ForwardError, Forwarder};
pub use gateway::Gateway;
pub use policy::MigrationPolicy;
pub use response::{Body, Response};
pub use routing::{Decision, Dice, Reason, Rule, Splitter, ThreadDice};
pub use server::Server;
