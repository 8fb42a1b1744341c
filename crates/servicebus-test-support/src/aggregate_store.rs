//! Test aggregate store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use servicebus_core::clock::{Clock, SystemClock};
use servicebus_core::error::ServiceBusError;
use servicebus_event_sourcing::{
    AfterSaveHandler, AggregateId, AggregateStore, CallbackPlacement, StoredAggregateEventStream,
};

/// An aggregate store that keeps streams in memory.
///
/// Writes are validated first. By default the after-save handler then runs
/// and the events become visible only if it succeeds, like a transaction
/// that runs the handler before commit. With
/// [`CallbackPlacement::AfterCommit`] the events are stored first and a
/// failing handler is reported as `ServiceBusError::PostCommitFailed`.
pub struct InMemoryAggregateStore {
    streams: Mutex<HashMap<AggregateId, StoredAggregateEventStream>>,
    clock: Arc<dyn Clock>,
    placement: CallbackPlacement,
}

impl InMemoryAggregateStore {
    /// Creates an empty store stamping times from the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping times from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            clock,
            placement: CallbackPlacement::InsideTransaction,
        }
    }

    /// Sets where after-save handlers run.
    #[must_use]
    pub fn with_callback_placement(mut self, placement: CallbackPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Returns the full stored stream for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stream(&self, id: &AggregateId) -> Option<StoredAggregateEventStream> {
        self.streams.lock().unwrap().get(id).cloned()
    }

    /// Stores `stream` as is, bypassing validation. Useful for seeding
    /// corrupt or foreign data.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed(&self, stream: StoredAggregateEventStream) {
        self.streams
            .lock()
            .unwrap()
            .insert(stream.aggregate_id.clone(), stream);
    }

    fn check_new_events(
        existing: Option<&StoredAggregateEventStream>,
        stream: &StoredAggregateEventStream,
    ) -> Result<(), ServiceBusError> {
        let Some(existing) = existing else {
            return Ok(());
        };
        for playhead in stream.events.keys() {
            if existing.events.contains_key(playhead) {
                return Err(ServiceBusError::UniqueConstraintViolation(format!(
                    "stream {} already has an event at playhead {playhead}",
                    stream.aggregate_id
                )));
            }
        }
        Ok(())
    }

    async fn commit_with(
        &self,
        stream: &StoredAggregateEventStream,
        is_new: bool,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError> {
        match self.placement {
            CallbackPlacement::InsideTransaction => {
                after_save().await?;
                self.commit_events(stream, is_new);
                Ok(())
            }
            CallbackPlacement::AfterCommit => {
                self.commit_events(stream, is_new);
                after_save().await.map_err(ServiceBusError::after_commit)
            }
        }
    }

    fn commit_events(&self, stream: &StoredAggregateEventStream, is_new: bool) {
        let recorded_at = self.clock.now();
        let mut streams = self.streams.lock().unwrap();

        let target = streams
            .entry(stream.aggregate_id.clone())
            .or_insert_with(|| StoredAggregateEventStream {
                events: Default::default(),
                ..stream.clone()
            });
        if is_new {
            target.created_at = stream.created_at;
        }
        for event in stream.ordered_events() {
            let mut event = event.clone();
            event.recorded_at = Some(recorded_at);
            target.push(event);
        }
    }
}

impl Default for InMemoryAggregateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAggregateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAggregateStore")
            .field("streams", &self.streams)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn save_stream(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError> {
        if self
            .streams
            .lock()
            .unwrap()
            .contains_key(&stream.aggregate_id)
        {
            return Err(ServiceBusError::UniqueConstraintViolation(format!(
                "stream {} already exists",
                stream.aggregate_id
            )));
        }

        self.commit_with(stream, true, after_save).await
    }

    async fn append_stream(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError> {
        {
            let streams = self.streams.lock().unwrap();
            Self::check_new_events(streams.get(&stream.aggregate_id), stream)?;
        }

        self.commit_with(stream, false, after_save).await
    }

    async fn load_stream(
        &self,
        id: &AggregateId,
        from_version: i64,
        to_version: Option<i64>,
    ) -> Result<Option<StoredAggregateEventStream>, ServiceBusError> {
        let Some(mut stream) = self.stream(id) else {
            return Ok(None);
        };

        let upper = to_version.filter(|to| *to > from_version);
        stream.events.retain(|playhead, _| {
            *playhead >= from_version && upper.is_none_or(|to| *playhead <= to)
        });
        Ok(Some(stream))
    }

    async fn close_stream(&self, id: &AggregateId) -> Result<(), ServiceBusError> {
        let now = self.clock.now();
        if let Some(stream) = self.streams.lock().unwrap().get_mut(id) {
            if stream.closed_at.is_none() {
                stream.closed_at = Some(now);
            }
        }
        Ok(())
    }
}
