//! Aggregate identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use servicebus_core::error::ServiceBusError;
use uuid::Uuid;

/// Identifies one aggregate and, with it, one event stream.
///
/// Unique per `(value, id_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateId {
    value: String,
    id_type: String,
}

impl AggregateId {
    /// Creates an identifier.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if either part is empty.
    pub fn new(
        value: impl Into<String>,
        id_type: impl Into<String>,
    ) -> Result<Self, ServiceBusError> {
        let value = value.into();
        let id_type = id_type.into();

        if value.trim().is_empty() {
            return Err(ServiceBusError::InvalidIdentifier(
                "aggregate identifier value must not be empty".to_owned(),
            ));
        }
        if id_type.trim().is_empty() {
            return Err(ServiceBusError::InvalidIdentifier(format!(
                "aggregate identifier {value} must name its id type"
            )));
        }

        Ok(Self { value, id_type })
    }

    /// Generates a random identifier of type `id_type`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if `id_type` is empty.
    pub fn generate(id_type: impl Into<String>) -> Result<Self, ServiceBusError> {
        Self::new(Uuid::new_v4().to_string(), id_type)
    }

    /// The identifier value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The identifier type tag.
    #[must_use]
    pub fn id_type(&self) -> &str {
        &self.id_type
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
