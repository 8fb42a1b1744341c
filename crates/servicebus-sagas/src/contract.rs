//! Saga lifecycle events published to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use servicebus_core::message::{Event, Message};

use crate::id::SagaId;
use crate::status::SagaStatus;

/// Emitted when a new saga is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaCreated {
    /// Saga identifier value.
    pub id: String,
    /// Saga identifier type.
    pub id_type: String,
    /// Saga type.
    pub saga_type: String,
    /// Creation time.
    pub datetime: DateTime<Utc>,
    /// When the saga expires.
    pub expiration_date: DateTime<Utc>,
}

impl SagaCreated {
    /// Creates the event for `id`.
    #[must_use]
    pub fn new(id: &SagaId, datetime: DateTime<Utc>, expiration_date: DateTime<Utc>) -> Self {
        Self {
            id: id.value().to_owned(),
            id_type: id.id_type().to_owned(),
            saga_type: id.saga_type().to_owned(),
            datetime,
            expiration_date,
        }
    }
}

/// Emitted when a saga moves to another status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStatusChanged {
    /// Saga identifier value.
    pub id: String,
    /// Saga identifier type.
    pub id_type: String,
    /// Saga type.
    pub saga_type: String,
    /// Status before the change.
    pub previous_status: SagaStatus,
    /// Status after the change.
    pub new_status: SagaStatus,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// Time of the change.
    pub datetime: DateTime<Utc>,
}

impl SagaStatusChanged {
    /// Creates the event for `id`.
    #[must_use]
    pub fn new(
        id: &SagaId,
        previous_status: SagaStatus,
        new_status: SagaStatus,
        reason: Option<&str>,
        datetime: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.value().to_owned(),
            id_type: id.id_type().to_owned(),
            saga_type: id.saga_type().to_owned(),
            previous_status,
            new_status,
            reason: reason.map(str::to_owned),
            datetime,
        }
    }
}

/// Emitted when a saga reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaClosed {
    /// Saga identifier value.
    pub id: String,
    /// Saga identifier type.
    pub id_type: String,
    /// Saga type.
    pub saga_type: String,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// Time of closing.
    pub datetime: DateTime<Utc>,
}

impl SagaClosed {
    /// Creates the event for `id`.
    #[must_use]
    pub fn new(id: &SagaId, reason: Option<&str>, datetime: DateTime<Utc>) -> Self {
        Self {
            id: id.value().to_owned(),
            id_type: id.id_type().to_owned(),
            saga_type: id.saga_type().to_owned(),
            reason: reason.map(str::to_owned),
            datetime,
        }
    }
}

impl Message for SagaCreated {
    fn message_type(&self) -> &'static str {
        "sagas.saga_created"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("SagaCreated serialization is infallible")
    }
}

impl Message for SagaStatusChanged {
    fn message_type(&self) -> &'static str {
        "sagas.saga_status_changed"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("SagaStatusChanged serialization is infallible")
    }
}

impl Message for SagaClosed {
    fn message_type(&self) -> &'static str {
        "sagas.saga_closed"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("SagaClosed serialization is infallible")
    }
}

impl Event for SagaCreated {}
impl Event for SagaStatusChanged {}
impl Event for SagaClosed {}
