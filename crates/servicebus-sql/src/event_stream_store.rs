//! `PostgreSQL` implementation of the `AggregateStore` trait.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servicebus_core::clock::{Clock, SystemClock};
use servicebus_core::error::ServiceBusError;
use servicebus_event_sourcing::{
    AfterSaveHandler, AggregateId, AggregateStore, CallbackPlacement, StoredAggregateEvent,
    StoredAggregateEventStream,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::storage_error;
use crate::transaction::{begin, complete};

/// Rows per multi-row event insert. Each row binds 8 parameters and
/// `PostgreSQL` accepts at most 65 535 per statement.
const EVENTS_PER_INSERT: usize = 1_000;

#[derive(Debug, FromRow)]
struct StreamRow {
    aggregate_class: String,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    playhead: i64,
    event_class: String,
    payload: Vec<u8>,
    occured_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

impl From<EventRow> for StoredAggregateEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.id,
            playhead: row.playhead,
            event_type: row.event_class,
            payload: row.payload,
            occurred_at: row.occured_at,
            recorded_at: Some(row.recorded_at),
        }
    }
}

/// PostgreSQL-backed aggregate event stream store.
#[derive(Clone)]
pub struct SqlEventStreamStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    placement: CallbackPlacement,
}

impl SqlEventStreamStore {
    /// Creates a store that stamps times from the system clock and runs
    /// after-save handlers after commit.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
            placement: CallbackPlacement::default(),
        }
    }

    /// Uses `clock` for recording and close times.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets where after-save handlers run.
    #[must_use]
    pub fn with_callback_placement(mut self, placement: CallbackPlacement) -> Self {
        self.placement = placement;
        self
    }

    async fn write(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
        with_header: bool,
    ) -> Result<(), ServiceBusError> {
        let mut tx = begin(&self.pool).await?;

        match self.placement {
            CallbackPlacement::InsideTransaction => {
                let outcome = match self.insert(&mut tx, stream, with_header).await {
                    Ok(()) => after_save().await,
                    Err(e) => Err(e),
                };
                complete(tx, outcome).await
            }
            CallbackPlacement::AfterCommit => {
                let outcome = self.insert(&mut tx, stream, with_header).await;
                complete(tx, outcome).await?;
                after_save().await.map_err(ServiceBusError::after_commit)
            }
        }
    }

    async fn insert(
        &self,
        conn: &mut PgConnection,
        stream: &StoredAggregateEventStream,
        with_header: bool,
    ) -> Result<(), ServiceBusError> {
        if with_header {
            sqlx::query(
                "INSERT INTO event_store_stream
                    (id, identifier_class, aggregate_class, created_at, closed_at)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(stream.aggregate_id.value())
            .bind(stream.aggregate_id.id_type())
            .bind(&stream.aggregate_type)
            .bind(stream.created_at)
            .bind(stream.closed_at)
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;
        }

        if stream.is_empty() {
            return Ok(());
        }

        let recorded_at = self.clock.now();
        let events: Vec<&StoredAggregateEvent> = stream.ordered_events().collect();
        for chunk in events.chunks(EVENTS_PER_INSERT) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO event_store_stream_events \
                 (id, stream_id, identifier_class, playhead, event_class, payload, \
                 occured_at, recorded_at) ",
            );
            builder.push_values(chunk.iter().copied(), |mut row, event| {
                row.push_bind(event.event_id);
                row.push_bind(stream.aggregate_id.value());
                row.push_bind(stream.aggregate_id.id_type());
                row.push_bind(event.playhead);
                row.push_bind(&event.event_type);
                row.push_bind(&event.payload);
                row.push_bind(event.occurred_at);
                row.push_bind(recorded_at);
            });
            builder
                .build()
                .execute(&mut *conn)
                .await
                .map_err(storage_error)?;
        }

        debug!(events = stream.len(), "stream events inserted");
        Ok(())
    }
}

impl std::fmt::Debug for SqlEventStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlEventStreamStore")
            .field("pool", &self.pool)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AggregateStore for SqlEventStreamStore {
    #[instrument(skip(self, stream, after_save), fields(aggregate_id = %stream.aggregate_id))]
    async fn save_stream(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError> {
        self.write(stream, after_save, true).await?;
        info!(events = stream.len(), "stream saved");
        Ok(())
    }

    #[instrument(skip(self, stream, after_save), fields(aggregate_id = %stream.aggregate_id))]
    async fn append_stream(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError> {
        self.write(stream, after_save, false).await?;
        info!(events = stream.len(), "stream appended");
        Ok(())
    }

    #[instrument(skip(self), fields(aggregate_id = %id))]
    async fn load_stream(
        &self,
        id: &AggregateId,
        from_version: i64,
        to_version: Option<i64>,
    ) -> Result<Option<StoredAggregateEventStream>, ServiceBusError> {
        let header: Option<StreamRow> = sqlx::query_as(
            "SELECT aggregate_class, created_at, closed_at
             FROM event_store_stream
             WHERE id = $1 AND identifier_class = $2",
        )
        .bind(id.value())
        .bind(id.id_type())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        let Some(header) = header else {
            debug!("stream not found");
            return Ok(None);
        };

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT id, playhead, event_class, payload, occured_at, recorded_at \
             FROM event_store_stream_events WHERE stream_id = ",
        );
        builder.push_bind(id.value());
        builder.push(" AND identifier_class = ");
        builder.push_bind(id.id_type());
        builder.push(" AND playhead >= ");
        builder.push_bind(from_version);
        if let Some(to) = to_version.filter(|to| *to > from_version) {
            builder.push(" AND playhead <= ");
            builder.push_bind(to);
        }
        builder.push(" ORDER BY playhead ASC");

        let rows: Vec<EventRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        let mut stream =
            StoredAggregateEventStream::new(id.clone(), header.aggregate_class, header.created_at);
        stream.closed_at = header.closed_at;
        for row in rows {
            stream.push(row.into());
        }

        debug!(events = stream.len(), "stream loaded");
        Ok(Some(stream))
    }

    #[instrument(skip(self), fields(aggregate_id = %id))]
    async fn close_stream(&self, id: &AggregateId) -> Result<(), ServiceBusError> {
        let result = sqlx::query(
            "UPDATE event_store_stream SET closed_at = $1
             WHERE id = $2 AND identifier_class = $3 AND closed_at IS NULL",
        )
        .bind(self.clock.now())
        .bind(id.value())
        .bind(id.id_type())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(closed = result.rows_affected() > 0, "stream close requested");
        Ok(())
    }
}
