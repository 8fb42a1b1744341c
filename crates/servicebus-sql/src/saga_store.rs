//! `PostgreSQL` implementation of the `SagaStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servicebus_core::error::ServiceBusError;
use servicebus_sagas::{SagaId, SagaStatus, SagaStore, StoredSaga};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

use crate::error::storage_error;

#[derive(Debug, FromRow)]
struct SagaRow {
    saga_class: String,
    payload: Vec<u8>,
    state_id: String,
    created_at: DateTime<Utc>,
    expiration_date: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl SagaRow {
    fn into_stored(self, id: &SagaId) -> Result<StoredSaga, ServiceBusError> {
        let id = SagaId::new(id.value(), id.id_type(), self.saga_class).map_err(|e| {
            ServiceBusError::RestoreFailed(format!("saga {id} has a corrupt identity: {e}"))
        })?;
        let status: SagaStatus = self.state_id.parse()?;

        Ok(StoredSaga {
            id,
            status,
            payload: self.payload,
            created_at: self.created_at,
            expiration_date: self.expiration_date,
            closed_at: self.closed_at,
        })
    }
}

/// PostgreSQL-backed saga store.
#[derive(Debug, Clone)]
pub struct SqlSagaStore {
    pool: PgPool,
}

impl SqlSagaStore {
    /// Creates a new `SqlSagaStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SagaStore for SqlSagaStore {
    #[instrument(skip(self, saga), fields(saga_id = %saga.id, saga_type = saga.id.saga_type()))]
    async fn save(&self, saga: &StoredSaga) -> Result<(), ServiceBusError> {
        sqlx::query(
            "INSERT INTO sagas_store
                (id, identifier_class, saga_class, payload, state_id,
                 created_at, expiration_date, closed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(saga.id.value())
        .bind(saga.id.id_type())
        .bind(saga.id.saga_type())
        .bind(&saga.payload)
        .bind(saga.status.as_str())
        .bind(saga.created_at)
        .bind(saga.expiration_date)
        .bind(saga.closed_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(status = %saga.status, "saga inserted");
        Ok(())
    }

    #[instrument(skip(self, saga), fields(saga_id = %saga.id, saga_type = saga.id.saga_type()))]
    async fn update(&self, saga: &StoredSaga) -> Result<(), ServiceBusError> {
        let result = sqlx::query(
            "UPDATE sagas_store
             SET payload = $1, state_id = $2, expiration_date = $3, closed_at = $4
             WHERE id = $5 AND identifier_class = $6",
        )
        .bind(&saga.payload)
        .bind(saga.status.as_str())
        .bind(saga.expiration_date)
        .bind(saga.closed_at)
        .bind(saga.id.value())
        .bind(saga.id.id_type())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(
            status = %saga.status,
            rows = result.rows_affected(),
            "saga updated"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(saga_id = %id))]
    async fn load(&self, id: &SagaId) -> Result<Option<StoredSaga>, ServiceBusError> {
        let row: Option<SagaRow> = sqlx::query_as(
            "SELECT saga_class, payload, state_id, created_at, expiration_date, closed_at
             FROM sagas_store
             WHERE id = $1 AND identifier_class = $2",
        )
        .bind(id.value())
        .bind(id.id_type())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(|row| row.into_stored(id)).transpose()
    }

    #[instrument(skip(self), fields(saga_id = %id))]
    async fn remove(&self, id: &SagaId) -> Result<(), ServiceBusError> {
        let result = sqlx::query("DELETE FROM sagas_store WHERE id = $1 AND identifier_class = $2")
            .bind(id.value())
            .bind(id.id_type())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        debug!(removed = result.rows_affected() > 0, "saga removed");
        Ok(())
    }
}
