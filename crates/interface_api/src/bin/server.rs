//! Settlement API Server Binary
//!
//! Starts the HTTP API for the mutual settlement core.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin settlement-api
//!
//! # Run with environment variables
//! SETTLEMENT_PORT=8080 SETTLEMENT_DATABASE_URL=postgres://... cargo run --bin settlement-api
//! ```
//!
//! # Environment Variables
//!
//! A `.env` file in the working directory is loaded first.
//!
//! * `SETTLEMENT_HOST` - Server host (default: 0.0.0.0)
//! * `SETTLEMENT_PORT` - Server port (default: 8080)
//! * `SETTLEMENT_DATABASE_URL` - PostgreSQL connection string
//! * `SETTLEMENT_MAX_CONNECTIONS` - Pool size (default: 10)
//! * `SETTLEMENT_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `SETTLEMENT_LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresSettlementStore};
use interface_api::{
    config::{ApiConfig, LogFormat},
    create_router,
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = ApiConfig::from_env().context("loading configuration")?;

    init_tracing(&config.log_level, config.log_format);

    tracing::info!(
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        "Starting settlement API"
    );

    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone()).max_connections(config.max_connections),
    )
    .await
    .context("connecting to database")?;

    run_migrations(&pool).await.context("running migrations")?;

    let store = Arc::new(PostgresSettlementStore::new(pool));
    let app = create_router(store);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address '{}'", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Installs the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Waits for Ctrl+C or SIGTERM so in-flight requests can finish
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
