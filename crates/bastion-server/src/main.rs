//! Bastion Server: application entry point.

use std::time::Duration;

use bastion_db::repository::{SurrealRefreshTokenRepository, SurrealTenantRepository};
use bastion_db::{DbManager, run_migrations};
use bastion_server::{AppState, ServerConfig, ServerError, bootstrap, jobs};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Result<(), ServerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("bastion=info"))
        .map_err(|e| ServerError::Tracing(e.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init()
        .map_err(|e| ServerError::Tracing(e.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    init_tracing()?;
    info!("Starting Bastion server...");

    let config = ServerConfig::load()?;
    let db = DbManager::connect(&config.database).await?;
    run_migrations(db.client()).await?;

    let seeded = bootstrap::seed(db.client(), &config.bootstrap).await?;
    let state = AppState::new(db, &config);

    let cleanup = jobs::spawn_refresh_cleanup(
        SurrealTenantRepository::new(state.db.client().clone()),
        SurrealRefreshTokenRepository::new(state.db.client().clone()),
        Duration::from_secs(config.jobs.refresh_cleanup_interval_secs),
    );

    info!(tenant_id = %seeded.tenant_id, "Bastion server ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }

    if let Some(handle) = cleanup {
        handle.abort();
    }
    state.cache.clear();
    info!("Bastion server stopped.");
    Ok(())
}
