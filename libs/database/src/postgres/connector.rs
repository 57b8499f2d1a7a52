use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

use super::PostgresConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

pub async fn connect_from_config(config: PostgresConfig) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(config.into_connect_options()).await?;
    info!("Successfully connected to PostgreSQL database");
    Ok(db)
}

/// Connects with exponential backoff so the service survives a database that
/// starts after it (compose, Kubernetes).
pub async fn connect_with_retry(
    config: PostgresConfig,
    retry_config: &RetryConfig,
) -> DatabaseResult<DatabaseConnection> {
    let options = config.into_connect_options();

    retry_with_backoff(|| Database::connect(options.clone()), retry_config)
        .await
        .inspect(|_| info!("Successfully connected to PostgreSQL database"))
        .map_err(|(e, attempts)| DatabaseError::ConnectionFailed {
            attempts,
            source: Box::new(e),
        })
}

/// Applies all pending migrations of `M`.
pub async fn run_migrations<M: MigratorTrait>(
    db: &DatabaseConnection,
    app_name: &str,
) -> DatabaseResult<()> {
    info!("Running {} database migrations...", app_name);
    M::up(db, None)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
    info!("Migrations completed successfully for {}", app_name);
    Ok(())
}

/// Closes the pool, logging the outcome. Used during graceful shutdown.
pub async fn close(db: DatabaseConnection, name: &str) {
    match db.close().await {
        Ok(()) => info!("PostgreSQL connection '{}' closed successfully", name),
        Err(e) => error!("Error closing PostgreSQL connection '{}': {}", name, e),
    }
}
