/// Account Service
///
/// Loads configuration, initializes logging, opens the database and serves
/// the HTTP API until the process is stopped.

use account_service::{config::LoggingConfig, server, AppContext, ServerConfig};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.storage.database_path.display(),
        "Starting account service"
    );

    let ctx = AppContext::new(config)
        .await
        .context("Failed to initialize application context")?;

    server::serve(ctx).await.context("Server terminated")?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| EnvFilter::new(account_service::config::DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
