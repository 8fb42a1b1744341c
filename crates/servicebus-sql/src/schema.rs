//! Database schema for the SQL stores.
//!
//! Tables:
//! - `event_store_stream` / `event_store_stream_events`: aggregate streams
//! - `sagas_store`: saga snapshots
//! - `scheduler_registry`: scheduled operations

use servicebus_core::error::ServiceBusError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

/// Migrations embedded from the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Applies all pending migrations.
///
/// # Errors
///
/// Returns `ServiceBusError::OperationFailed` if a migration cannot be applied.
pub async fn migrate(pool: &PgPool) -> Result<(), ServiceBusError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| ServiceBusError::OperationFailed(format!("migration failed: {e}")))?;

    info!(migrations = MIGRATOR.iter().count(), "storage schema up to date");
    Ok(())
}
