//! Products API - REST server

use axum_helpers::server::create_production_app;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::common::RetryConfig;
use database::postgres::{self, connect_with_retry, run_migrations};
use domain_products::InMemoryProductRepository;
use migration::Migrator;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::{AppState, Backend};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let backend = match &config.postgres {
        Some(pg_config) => {
            info!("Connecting to PostgreSQL");
            let db = connect_with_retry(pg_config.clone(), &RetryConfig::default()).await?;
            run_migrations::<Migrator>(&db, config.app.name).await?;
            Backend::Postgres(db)
        }
        None => {
            warn!("Using in-memory product store, data will not survive a restart");
            Backend::Memory(InMemoryProductRepository::new())
        }
    };

    let state = AppState { config, backend };
    let app = api::app(&state)?;

    info!(
        store = %state.config.store,
        "Starting {} v{} on port {}",
        state.config.app.name,
        state.config.app.version,
        state.config.server.port
    );

    let server_config = state.config.server.clone();
    let app_name = state.config.app.name;
    create_production_app(app, &server_config, SHUTDOWN_TIMEOUT, async move {
        if let Backend::Postgres(db) = state.backend {
            info!("Shutting down: closing PostgreSQL connections");
            postgres::close(db, app_name).await;
        }
    })
    .await?;

    info!("Products API shutdown complete");
    Ok(())
}
