use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sheet_analytics_api::config;
use sheet_analytics_api::database::DatabaseManager;
use sheet_analytics_api::server::{app, AppState};
use sheet_analytics_api::storage::LocalStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    info!("Starting Sheet Analytics API in {:?} mode", config.environment);

    // The server still answers /health without a database
    if let Err(e) = DatabaseManager::ensure_schema().await {
        warn!("Skipping schema setup, database unavailable: {}", e);
    }

    let storage = LocalStorage::new(&config.storage.upload_dir)
        .await
        .with_context(|| format!("failed to prepare upload dir {}", config.storage.upload_dir.display()))?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("Sheet Analytics API listening on http://{}", bind_addr);

    axum::serve(listener, app(AppState::new(storage)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    DatabaseManager::close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
