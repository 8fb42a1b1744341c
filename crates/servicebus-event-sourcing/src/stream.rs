//! Stored representation of aggregate event streams.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::id::AggregateId;

/// Playhead of the first event of every stream.
pub const START_PLAYHEAD_INDEX: i64 = 0;

/// One stored event of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAggregateEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Position within the stream.
    pub playhead: i64,
    /// Event type name used to decode the payload.
    pub event_type: String,
    /// Serialized event (JSON bytes).
    pub payload: Vec<u8>,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// When the store recorded the event. `None` until stored.
    pub recorded_at: Option<DateTime<Utc>>,
}

/// An aggregate's stream header plus its events keyed by playhead.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAggregateEventStream {
    /// Owning aggregate.
    pub aggregate_id: AggregateId,
    /// Owning aggregate type.
    pub aggregate_type: String,
    /// Events keyed by playhead.
    pub events: BTreeMap<i64, StoredAggregateEvent>,
    /// Stream creation time.
    pub created_at: DateTime<Utc>,
    /// Stream close time.
    pub closed_at: Option<DateTime<Utc>>,
}

impl StoredAggregateEventStream {
    /// Creates a stream header without events.
    #[must_use]
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            events: BTreeMap::new(),
            created_at,
            closed_at: None,
        }
    }

    /// Adds an event at its playhead, replacing any event already there.
    pub fn push(&mut self, event: StoredAggregateEvent) {
        self.events.insert(event.playhead, event);
    }

    /// Events in playhead order.
    pub fn ordered_events(&self) -> impl Iterator<Item = &StoredAggregateEvent> {
        self.events.values()
    }

    /// Highest playhead in the stream, if any.
    #[must_use]
    pub fn last_playhead(&self) -> Option<i64> {
        self.events.keys().next_back().copied()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the stream has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns `true` if playheads run from the first one without gaps.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        let Some(first) = self.events.keys().next().copied() else {
            return true;
        };
        self.events
            .keys()
            .zip(first..)
            .all(|(playhead, expected)| *playhead == expected)
    }
}
