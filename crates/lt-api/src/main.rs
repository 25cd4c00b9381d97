//! # lt-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the request guard.
//! Binds to configurable port (default 8080).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use lt_api::config::{AppConfig, LogFormat};
use lt_api::AppState;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Initialize structured tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    let port = config.port;
    let state = AppState::from_config(config)
        .await
        .map_err(|e| {
            tracing::error!("Startup failed: {e}");
            e
        })?
        .with_prometheus(prometheus);

    // Expired replay records are only swept lazily; keep the table bounded.
    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match sweeper.replay.purge_expired(sweeper.clock.now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "purged expired replay records"),
                Err(e) => tracing::warn!(error = %e, "replay purge failed"),
            }
        }
    });

    let app = lt_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Lokaltreu guard listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
