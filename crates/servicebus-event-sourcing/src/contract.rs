//! Aggregate lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use servicebus_core::message::{Event, Message, NamedMessage};
use servicebus_core::registry::MessageRegistry;

use crate::id::AggregateId;

/// Emitted when an aggregate is created. Always the first event of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCreated {
    /// Aggregate identifier value.
    pub id: String,
    /// Aggregate identifier type.
    pub id_type: String,
    /// Aggregate type.
    pub aggregate_type: String,
    /// Creation time.
    pub datetime: DateTime<Utc>,
}

impl AggregateCreated {
    /// Creates the event for `id`.
    #[must_use]
    pub fn new(id: &AggregateId, aggregate_type: &str, datetime: DateTime<Utc>) -> Self {
        Self {
            id: id.value().to_owned(),
            id_type: id.id_type().to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            datetime,
        }
    }
}

/// Emitted when an aggregate is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateClosed {
    /// Aggregate identifier value.
    pub id: String,
    /// Aggregate identifier type.
    pub id_type: String,
    /// Aggregate type.
    pub aggregate_type: String,
    /// Close time.
    pub datetime: DateTime<Utc>,
}

impl AggregateClosed {
    /// Creates the event for `id`.
    #[must_use]
    pub fn new(id: &AggregateId, aggregate_type: &str, datetime: DateTime<Utc>) -> Self {
        Self {
            id: id.value().to_owned(),
            id_type: id.id_type().to_owned(),
            aggregate_type: aggregate_type.to_owned(),
            datetime,
        }
    }
}

/// Stable type name of [`AggregateCreated`].
pub const AGGREGATE_CREATED: &str = "event_sourcing.aggregate_created";

/// Stable type name of [`AggregateClosed`].
pub const AGGREGATE_CLOSED: &str = "event_sourcing.aggregate_closed";

impl Message for AggregateCreated {
    fn message_type(&self) -> &'static str {
        Self::MESSAGE_TYPE
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("AggregateCreated serialization is infallible")
    }
}

impl Message for AggregateClosed {
    fn message_type(&self) -> &'static str {
        Self::MESSAGE_TYPE
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("AggregateClosed serialization is infallible")
    }
}

impl NamedMessage for AggregateCreated {
    const MESSAGE_TYPE: &'static str = AGGREGATE_CREATED;
}

impl NamedMessage for AggregateClosed {
    const MESSAGE_TYPE: &'static str = AGGREGATE_CLOSED;
}

impl Event for AggregateCreated {}
impl Event for AggregateClosed {}

/// Adds the lifecycle events to `registry` so stored streams can be replayed.
#[must_use]
pub fn register_lifecycle_events(registry: MessageRegistry) -> MessageRegistry {
    registry
        .register::<AggregateCreated>()
        .register::<AggregateClosed>()
}
