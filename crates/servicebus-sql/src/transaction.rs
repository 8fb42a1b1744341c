//! Transaction completion shared by the stores.

use servicebus_core::error::ServiceBusError;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

use crate::error::storage_error;

/// Opens a transaction on `pool`.
pub(crate) async fn begin(pool: &PgPool) -> Result<Transaction<'static, Postgres>, ServiceBusError> {
    pool.begin().await.map_err(storage_error)
}

/// Commits `tx` if `outcome` succeeded, otherwise rolls it back and returns
/// the original error.
///
/// A failed rollback is only logged; the connection is discarded by the pool
/// and the caller still sees the error that caused the rollback.
pub(crate) async fn complete<T>(
    tx: Transaction<'_, Postgres>,
    outcome: Result<T, ServiceBusError>,
) -> Result<T, ServiceBusError> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(storage_error)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "transaction rollback failed");
            }
            Err(e)
        }
    }
}
