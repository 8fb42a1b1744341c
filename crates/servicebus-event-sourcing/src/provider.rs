//! Event sourcing provider — saves and loads aggregates through a stream store.

use std::any::TypeId;
use std::sync::Arc;

use futures::FutureExt;
use servicebus_core::context::ExecutionContext;
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Message, runtime_type_id};
use servicebus_core::registry::{MessageRegistry, encode};
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{Aggregate, AggregateCore, PendingEvent};
use crate::contract::{AggregateClosed, register_lifecycle_events};
use crate::id::AggregateId;
use crate::store::{AfterSaveHandler, AggregateStore};
use crate::stream::{START_PLAYHEAD_INDEX, StoredAggregateEvent, StoredAggregateEventStream};

/// Persists aggregates as event streams and publishes their events.
pub struct EventSourcingProvider {
    store: Arc<dyn AggregateStore>,
    registry: Arc<MessageRegistry>,
}

impl EventSourcingProvider {
    /// Creates a provider.
    ///
    /// `registry` must know every event type the aggregates raise; the
    /// aggregate lifecycle events are added to it.
    #[must_use]
    pub fn new(store: Arc<dyn AggregateStore>, registry: MessageRegistry) -> Self {
        Self {
            store,
            registry: Arc::new(register_lifecycle_events(registry)),
        }
    }

    /// Stores the aggregate's pending events and publishes them.
    ///
    /// A freshly created aggregate (first pending event at the start
    /// playhead) is saved as a new stream; otherwise the events are appended.
    /// The events are delivered to `context` from the store's after-save
    /// handler. If the aggregate was closed in this batch the stream is
    /// closed as well.
    ///
    /// Pending events are cleared as soon as the store has committed them,
    /// even when a later step fails, so a retry never writes them twice.
    /// Such failures come back as `ServiceBusError::PostCommitFailed`.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a delivery error. Either is wrapped in
    /// `ServiceBusError::PostCommitFailed` when the events were stored
    /// regardless.
    #[instrument(skip(self, aggregate, context), fields(aggregate_id = %aggregate.id(), aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn save<A: Aggregate>(
        &self,
        aggregate: &mut A,
        context: Arc<dyn ExecutionContext>,
    ) -> Result<(), ServiceBusError> {
        let pending = aggregate.core().pending_events();
        let Some(first) = pending.first() else {
            debug!("no pending events");
            return Ok(());
        };

        let is_new = first.playhead == START_PLAYHEAD_INDEX;
        let closes = pending
            .iter()
            .any(|e| runtime_type_id(e.event.as_ref()) == TypeId::of::<AggregateClosed>());
        let stream = to_stream::<A>(aggregate.core());
        let messages: Vec<Arc<dyn Message>> =
            pending.iter().map(|e| Arc::clone(&e.event)).collect();
        let event_count = messages.len();

        let after_save: AfterSaveHandler =
            Box::new(move || async move { context.delivery_all(messages).await }.boxed());

        let written = if is_new {
            self.store.save_stream(&stream, after_save).await
        } else {
            self.store.append_stream(&stream, after_save).await
        };
        let outcome = match written {
            Err(e) if !e.is_committed() => return Err(e),
            outcome => outcome,
        };

        aggregate.core_mut().take_pending_events();

        if closes {
            self.store
                .close_stream(aggregate.id())
                .await
                .map_err(ServiceBusError::after_commit)?;
        }

        if let Err(e) = outcome {
            warn!(events = event_count, error = %e, "aggregate stored but not fully published");
            return Err(e);
        }

        info!(events = event_count, is_new, closes, "aggregate saved");
        Ok(())
    }

    /// Loads an aggregate by replaying its whole stream, or `None` if the
    /// stream does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::RestoreFailed` if the stream belongs to
    /// another aggregate type, has a playhead gap, or holds an event that
    /// cannot be decoded; otherwise a storage error.
    #[instrument(skip(self, id), fields(aggregate_id = %id, aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn load<A: Aggregate>(&self, id: &AggregateId) -> Result<Option<A>, ServiceBusError> {
        let Some(stream) = self
            .store
            .load_stream(id, START_PLAYHEAD_INDEX, None)
            .await?
        else {
            debug!("stream not found");
            return Ok(None);
        };

        if stream.aggregate_type != A::AGGREGATE_TYPE {
            return Err(ServiceBusError::RestoreFailed(format!(
                "stream {id} belongs to {}, not {}",
                stream.aggregate_type,
                A::AGGREGATE_TYPE
            )));
        }

        let mut aggregate = A::with_core(AggregateCore::restored(
            stream.aggregate_id.clone(),
            stream.created_at,
            stream.closed_at,
        ));

        for stored in stream.ordered_events() {
            let expected = aggregate.core().next_playhead();
            if stored.playhead != expected {
                return Err(ServiceBusError::RestoreFailed(format!(
                    "stream {id} has event at playhead {} where {expected} was expected",
                    stored.playhead
                )));
            }

            let event = self.registry.decode(&stored.event_type, &stored.payload)?;
            aggregate.replay(event.as_ref());
        }

        debug!(version = aggregate.version(), "aggregate restored");
        Ok(Some(aggregate))
    }
}

fn to_stream<A: Aggregate>(core: &AggregateCore) -> StoredAggregateEventStream {
    let mut stream =
        StoredAggregateEventStream::new(core.id().clone(), A::AGGREGATE_TYPE, core.created_at());
    stream.closed_at = core.closed_at();
    for pending in core.pending_events() {
        stream.push(to_stored_event(pending));
    }
    stream
}

fn to_stored_event(pending: &PendingEvent) -> StoredAggregateEvent {
    StoredAggregateEvent {
        event_id: pending.event_id,
        playhead: pending.playhead,
        event_type: pending.event.message_type().to_owned(),
        payload: encode(pending.event.as_ref()),
        occurred_at: pending.occurred_at,
        recorded_at: None,
    }
}

impl std::fmt::Debug for EventSourcingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSourcingProvider")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
