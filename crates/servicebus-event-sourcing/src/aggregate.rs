//! Event-sourced aggregate root.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use servicebus_core::apply::EventAppliers;
use servicebus_core::clock::Clock;
use servicebus_core::message::{Event, Message};
use uuid::Uuid;

use crate::contract::{AggregateClosed, AggregateCreated};
use crate::id::AggregateId;
use crate::stream::START_PLAYHEAD_INDEX;

/// An event raised since the aggregate was last saved.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    /// Identifier the event will be stored under.
    pub event_id: Uuid,
    /// Position the event takes in the stream.
    pub playhead: i64,
    /// When the event was raised.
    pub occurred_at: DateTime<Utc>,
    /// The event itself.
    pub event: Arc<dyn Message>,
}

/// State every aggregate carries.
#[derive(Debug)]
pub struct AggregateCore {
    id: AggregateId,
    version: i64,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    pending: Vec<PendingEvent>,
}

impl AggregateCore {
    fn new(id: AggregateId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            version: 0,
            created_at,
            closed_at: None,
            pending: Vec::new(),
        }
    }

    /// Core for an aggregate being rebuilt from its stored stream.
    #[must_use]
    pub fn restored(
        id: AggregateId,
        created_at: DateTime<Utc>,
        closed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            closed_at,
            ..Self::new(id, created_at)
        }
    }

    /// The aggregate identifier.
    #[must_use]
    pub fn id(&self) -> &AggregateId {
        &self.id
    }

    /// Number of events applied, stored or pending.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Playhead the next raised event will take.
    #[must_use]
    pub fn next_playhead(&self) -> i64 {
        START_PLAYHEAD_INDEX + self.version
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Close time, if closed.
    #[must_use]
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Returns `true` once the aggregate has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Events raised since the last save, in playhead order.
    #[must_use]
    pub fn pending_events(&self) -> &[PendingEvent] {
        &self.pending
    }

    /// Drains the pending events.
    pub fn take_pending_events(&mut self) -> Vec<PendingEvent> {
        std::mem::take(&mut self.pending)
    }

    fn record(&mut self, event: Arc<dyn Message>, occurred_at: DateTime<Utc>) {
        let playhead = self.next_playhead();
        self.version += 1;
        self.pending.push(PendingEvent {
            event_id: Uuid::new_v4(),
            playhead,
            occurred_at,
            event,
        });
    }

    fn track_lifecycle(&mut self, event: &dyn Message) {
        if let Some(closed) = event.as_any().downcast_ref::<AggregateClosed>() {
            if self.closed_at.is_none() {
                self.closed_at = Some(closed.datetime);
            }
        }
    }
}

/// Trait for event-sourced aggregates.
///
/// State is changed only by applying events, through the [`EventAppliers`]
/// table of the aggregate type, so replaying the stored stream yields the
/// same state the live instance had.
pub trait Aggregate: Send + Sync + Sized + 'static {
    /// Stable aggregate type name stored with the stream.
    const AGGREGATE_TYPE: &'static str;

    /// Builds the initial state around a core.
    fn with_core(core: AggregateCore) -> Self;

    /// Borrow the core.
    fn core(&self) -> &AggregateCore;

    /// Mutably borrow the core.
    fn core_mut(&mut self) -> &mut AggregateCore;

    /// The applier table for this aggregate type.
    fn appliers() -> &'static EventAppliers<Self>;

    /// Creates a new aggregate and raises [`AggregateCreated`] at the start
    /// playhead.
    fn create(id: AggregateId, clock: &dyn Clock) -> Self {
        let now = clock.now();
        let created = AggregateCreated::new(&id, Self::AGGREGATE_TYPE, now);

        let mut aggregate = Self::with_core(AggregateCore::new(id, now));
        aggregate.raise(created, clock);
        aggregate
    }

    /// The aggregate identifier.
    fn id(&self) -> &AggregateId {
        self.core().id()
    }

    /// Number of events applied.
    fn version(&self) -> i64 {
        self.core().version()
    }

    /// Applies `event` and records it as pending at the next playhead.
    fn raise<E: Event>(&mut self, event: E, clock: &dyn Clock) {
        Self::appliers().apply(self, &event);
        self.core_mut().track_lifecycle(&event);
        self.core_mut().record(Arc::new(event), clock.now());
    }

    /// Applies a stored event without recording it.
    fn replay(&mut self, event: &dyn Message) {
        Self::appliers().apply(self, event);
        let core = self.core_mut();
        core.track_lifecycle(event);
        core.version += 1;
    }

    /// Closes the aggregate by raising [`AggregateClosed`].
    ///
    /// Closing an already closed aggregate raises nothing.
    fn close(&mut self, clock: &dyn Clock) {
        if self.core().is_closed() {
            return;
        }
        let closed = AggregateClosed::new(self.id(), Self::AGGREGATE_TYPE, clock.now());
        self.raise(closed, clock);
    }
}
