//! Scheduled operation identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use servicebus_core::error::ServiceBusError;
use uuid::Uuid;

/// Identifies one scheduled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduledOperationId(Uuid);

impl ScheduledOperationId {
    /// Generates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ScheduledOperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ScheduledOperationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for ScheduledOperationId {
    type Err = ServiceBusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|e| {
            ServiceBusError::InvalidIdentifier(format!("scheduled operation id {s:?}: {e}"))
        })
    }
}

impl fmt::Display for ScheduledOperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
