//! `PostgreSQL` implementation of the `IndexStore` trait.

use async_trait::async_trait;
use servicebus_core::error::ServiceBusError;
use servicebus_index::{IndexKey, IndexStore, IndexValue};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::error::storage_error;

/// PostgreSQL-backed index store. Values are kept as JSONB scalars.
#[derive(Debug, Clone)]
pub struct SqlIndexStore {
    pool: PgPool,
}

impl SqlIndexStore {
    /// Creates a new `SqlIndexStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IndexStore for SqlIndexStore {
    #[instrument(skip(self), fields(index = key.index_name(), value_key = key.value_key()))]
    async fn find(&self, key: &IndexKey) -> Result<Option<IndexValue>, ServiceBusError> {
        let stored: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT value_data FROM event_sourcing_indexes
             WHERE index_tag = $1 AND value_key = $2",
        )
        .bind(key.index_name())
        .bind(key.value_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        stored.map(IndexValue::from_json).transpose()
    }

    #[instrument(skip(self, value), fields(index = key.index_name(), value_key = key.value_key()))]
    async fn add(&self, key: &IndexKey, value: &IndexValue) -> Result<(), ServiceBusError> {
        sqlx::query(
            "INSERT INTO event_sourcing_indexes (index_tag, value_key, value_data)
             VALUES ($1, $2, $3)",
        )
        .bind(key.index_name())
        .bind(key.value_key())
        .bind(value.to_json()?)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!("index entry added");
        Ok(())
    }

    #[instrument(skip(self), fields(index = key.index_name(), value_key = key.value_key()))]
    async fn delete(&self, key: &IndexKey) -> Result<(), ServiceBusError> {
        let result = sqlx::query(
            "DELETE FROM event_sourcing_indexes WHERE index_tag = $1 AND value_key = $2",
        )
        .bind(key.index_name())
        .bind(key.value_key())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(removed = result.rows_affected() > 0, "index entry deleted");
        Ok(())
    }

    #[instrument(skip(self, value), fields(index = key.index_name(), value_key = key.value_key()))]
    async fn update(&self, key: &IndexKey, value: &IndexValue) -> Result<(), ServiceBusError> {
        let result = sqlx::query(
            "UPDATE event_sourcing_indexes SET value_data = $1
             WHERE index_tag = $2 AND value_key = $3",
        )
        .bind(value.to_json()?)
        .bind(key.index_name())
        .bind(key.value_key())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(rows = result.rows_affected(), "index entry updated");
        Ok(())
    }
}
