//! Scheduler lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use servicebus_core::message::{Event, Message};

use crate::id::ScheduledOperationId;
use crate::operation::NextScheduledOperation;

/// Emitted when an operation has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationScheduled {
    /// Operation identifier.
    pub id: ScheduledOperationId,
    /// Type name of the scheduled command.
    pub command_type: String,
    /// When the command is due.
    pub execution_date: DateTime<Utc>,
    /// The soonest pending operation after this one was stored.
    pub next_operation: Option<NextScheduledOperation>,
}

/// Emitted when an operation was cancelled before running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerOperationCanceled {
    /// Operation identifier.
    pub id: ScheduledOperationId,
    /// Optional human-readable reason.
    pub reason: Option<String>,
    /// The soonest pending operation after the removal.
    pub next_operation: Option<NextScheduledOperation>,
}

/// Emitted after a due operation's command has been delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerOperationEmitted {
    /// Operation identifier.
    pub id: ScheduledOperationId,
    /// The soonest pending operation after the extraction.
    pub next_operation: Option<NextScheduledOperation>,
}

impl Message for OperationScheduled {
    fn message_type(&self) -> &'static str {
        "scheduler.operation_scheduled"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("OperationScheduled serialization is infallible")
    }
}

impl Message for SchedulerOperationCanceled {
    fn message_type(&self) -> &'static str {
        "scheduler.operation_canceled"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("SchedulerOperationCanceled serialization is infallible")
    }
}

impl Message for SchedulerOperationEmitted {
    fn message_type(&self) -> &'static str {
        "scheduler.operation_emitted"
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("SchedulerOperationEmitted serialization is infallible")
    }
}

impl Event for OperationScheduled {}
impl Event for SchedulerOperationCanceled {}
impl Event for SchedulerOperationEmitted {}
