//! `PostgreSQL` implementation of the `SchedulerStore` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servicebus_core::error::ServiceBusError;
use servicebus_core::registry::MessageRegistry;
use servicebus_scheduler::{
    NextScheduledOperation, PostAdd, PostExtract, PostRemove, ScheduledOperation,
    ScheduledOperationId, SchedulerStore,
};
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::storage_error;
use crate::transaction::{begin, complete};

#[derive(Debug, FromRow)]
struct OperationRow {
    id: Uuid,
    processing_date: DateTime<Utc>,
    command_type: String,
    command: serde_json::Value,
    is_sent: bool,
}

#[derive(Debug, FromRow)]
struct NextRow {
    id: Uuid,
    processing_date: DateTime<Utc>,
}

/// PostgreSQL-backed scheduler store.
///
/// Stored commands are decoded through the [`MessageRegistry`], so every
/// command type that may be scheduled must be registered there.
#[derive(Debug, Clone)]
pub struct SqlSchedulerStore {
    pool: PgPool,
    registry: Arc<MessageRegistry>,
}

impl SqlSchedulerStore {
    /// Creates a new `SqlSchedulerStore`.
    #[must_use]
    pub fn new(pool: PgPool, registry: Arc<MessageRegistry>) -> Self {
        Self { pool, registry }
    }

    async fn insert(
        conn: &mut PgConnection,
        operation: &ScheduledOperation,
    ) -> Result<(), ServiceBusError> {
        sqlx::query(
            "INSERT INTO scheduler_registry
                (id, processing_date, command_type, command, is_sent)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(operation.id().as_uuid())
        .bind(operation.date())
        .bind(operation.command().message_type())
        .bind(operation.command().to_payload())
        .bind(operation.is_sent())
        .execute(conn)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    /// Locks the soonest unsent operation and flags it as sent.
    async fn take_next(
        conn: &mut PgConnection,
    ) -> Result<Option<NextScheduledOperation>, ServiceBusError> {
        let row: Option<NextRow> = sqlx::query_as(
            "SELECT id, processing_date
             FROM scheduler_registry
             WHERE is_sent = FALSE
             ORDER BY processing_date ASC
             LIMIT 1
             FOR UPDATE",
        )
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("UPDATE scheduler_registry SET is_sent = TRUE WHERE id = $1")
            .bind(row.id)
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;

        Ok(Some(NextScheduledOperation {
            id: row.id.into(),
            time: row.processing_date,
        }))
    }

    async fn add_in(
        conn: &mut PgConnection,
        operation: ScheduledOperation,
        post_add: PostAdd,
    ) -> Result<(), ServiceBusError> {
        Self::insert(&mut *conn, &operation).await?;
        let next = Self::take_next(&mut *conn).await?;
        post_add(operation, next).await
    }

    async fn extract_in(
        &self,
        conn: &mut PgConnection,
        id: ScheduledOperationId,
        post_extract: PostExtract,
    ) -> Result<(), ServiceBusError> {
        let row: Option<OperationRow> = sqlx::query_as(
            "SELECT id, processing_date, command_type, command, is_sent
             FROM scheduler_registry
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        let row = row.ok_or_else(|| ServiceBusError::NotFound(format!("scheduled operation {id}")))?;
        let command = self.registry.decode_value(&row.command_type, row.command)?;
        let operation =
            ScheduledOperation::restore(row.id.into(), command, row.processing_date, row.is_sent);

        sqlx::query("DELETE FROM scheduler_registry WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;

        let next = Self::take_next(&mut *conn).await?;
        post_extract(operation, next).await
    }

    async fn remove_in(
        conn: &mut PgConnection,
        id: ScheduledOperationId,
        post_remove: PostRemove,
    ) -> Result<bool, ServiceBusError> {
        let result = sqlx::query("DELETE FROM scheduler_registry WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;

        let next = Self::take_next(&mut *conn).await?;
        post_remove(next).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SchedulerStore for SqlSchedulerStore {
    #[instrument(skip(self, operation, post_add), fields(operation_id = %operation.id()))]
    async fn add(
        &self,
        operation: ScheduledOperation,
        post_add: PostAdd,
    ) -> Result<(), ServiceBusError> {
        let mut tx = begin(&self.pool).await?;
        let outcome = Self::add_in(&mut tx, operation, post_add).await;
        complete(tx, outcome).await?;

        info!("scheduled operation added");
        Ok(())
    }

    #[instrument(skip(self, post_extract), fields(operation_id = %id))]
    async fn extract(
        &self,
        id: ScheduledOperationId,
        post_extract: PostExtract,
    ) -> Result<(), ServiceBusError> {
        let mut tx = begin(&self.pool).await?;
        let outcome = self.extract_in(&mut tx, id, post_extract).await;
        complete(tx, outcome).await?;

        info!("scheduled operation extracted");
        Ok(())
    }

    #[instrument(skip(self, post_remove), fields(operation_id = %id))]
    async fn remove(
        &self,
        id: ScheduledOperationId,
        post_remove: PostRemove,
    ) -> Result<bool, ServiceBusError> {
        let mut tx = begin(&self.pool).await?;
        let outcome = Self::remove_in(&mut tx, id, post_remove).await;
        let removed = complete(tx, outcome).await?;

        debug!(removed, "scheduled operation removal finished");
        Ok(removed)
    }
}
