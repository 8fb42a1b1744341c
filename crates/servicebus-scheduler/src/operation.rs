//! Scheduled operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use servicebus_core::clock::Clock;
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Command, Message};

use crate::id::ScheduledOperationId;

/// A command deferred to a future execution date.
#[derive(Debug, Clone)]
pub struct ScheduledOperation {
    id: ScheduledOperationId,
    command: Arc<dyn Message>,
    date: DateTime<Utc>,
    is_sent: bool,
}

impl ScheduledOperation {
    /// Creates an operation to run `command` at `date`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidScheduledOperationExecutionDate` if
    /// `date` is not strictly later than the clock's current time.
    pub fn new<C: Command>(
        id: ScheduledOperationId,
        command: C,
        date: DateTime<Utc>,
        clock: &dyn Clock,
    ) -> Result<Self, ServiceBusError> {
        let now = clock.now();
        if date <= now {
            return Err(ServiceBusError::InvalidScheduledOperationExecutionDate(
                format!("execution date {date} must be later than the current time {now}"),
            ));
        }

        Ok(Self::restore(id, Arc::new(command), date, false))
    }

    /// Rebuilds a stored operation. The date is not validated.
    #[must_use]
    pub fn restore(
        id: ScheduledOperationId,
        command: Arc<dyn Message>,
        date: DateTime<Utc>,
        is_sent: bool,
    ) -> Self {
        Self {
            id,
            command,
            date,
            is_sent,
        }
    }

    /// The operation identifier.
    #[must_use]
    pub fn id(&self) -> ScheduledOperationId {
        self.id
    }

    /// The command to deliver.
    #[must_use]
    pub fn command(&self) -> &Arc<dyn Message> {
        &self.command
    }

    /// When the command is due.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Returns `true` once the operation has been handed out as the next one
    /// to run.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.is_sent
    }
}

/// The soonest pending operation, returned so the caller can re-arm its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextScheduledOperation {
    /// Operation identifier.
    pub id: ScheduledOperationId,
    /// When it is due.
    pub time: DateTime<Utc>,
}

impl From<&ScheduledOperation> for NextScheduledOperation {
    fn from(operation: &ScheduledOperation) -> Self {
        Self {
            id: operation.id,
            time: operation.date,
        }
    }
}
