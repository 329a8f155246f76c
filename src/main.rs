//! veer binary: reads the environment, then serves until SIGTERM.

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use veer::{Config, Gateway, Server};

#[tokio::main]
async fn main() -> Result<(), veer::Error> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().inspect_err(|e| error!("{e}"))?;

    info!(
        legacy = %config.backends.legacy,
        new = %config.backends.new,
        migration = config.policy.is_enabled(),
        percent = config.policy.percent(),
        timeout = ?config.backend_timeout,
        "starting proxy"
    );

    Server::bind(config.listen).serve(Gateway::new(&config)).await
}
