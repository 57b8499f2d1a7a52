use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::debug;

use crate::common::DatabaseError;

/// Readiness probe: `SELECT 1` through the pool.
pub async fn check_health(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    debug!("Running PostgreSQL health check");

    db.execute_unprepared("SELECT 1")
        .await
        .map_err(|e| DatabaseError::HealthCheckFailed(format!("PostgreSQL: {}", e)))?;

    Ok(())
}
