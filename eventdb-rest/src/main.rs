//! Event history service entrypoint.
//!
//! # Environment Variables
//!
//! - `EVENTDB_CONFIG`: optional path to a TOML config file
//! - `EVENTDB_UPSTREAM_HOST`: scheduler authority (`host:port`)
//! - `EVENTDB_DB_DRIVER` / `EVENTDB_DB_HOST` / `EVENTDB_DB_PORT` /
//!   `EVENTDB_DB_NAME` / `EVENTDB_DB_USER` / `EVENTDB_DB_PASSWORD`:
//!   storage connection overrides
//! - `RUST_LOG`: tracing filter (default `info` for the service crates)

use eventdb_core::Config;
use eventdb_rest::EventService;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "eventdb_core=info,eventdb_client=info,eventdb_store=info,eventdb_rest=info,tower_http=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    let service = match EventService::new(config).await {
        Ok(service) => service,
        Err(err) => {
            tracing::error!(error = %err, "could not start the event service");
            std::process::exit(1);
        }
    };

    if let Err(err) = service.run(cancel).await {
        tracing::error!(error = %err, "event service failed");
        std::process::exit(1);
    }
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
