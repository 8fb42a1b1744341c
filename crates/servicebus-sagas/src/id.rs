//! Saga identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use servicebus_core::error::ServiceBusError;
use uuid::Uuid;

use crate::saga::Saga;

/// Identifies one saga instance.
///
/// The pair `(value, id_type)` is unique in storage; `saga_type` names the
/// saga the identifier was issued for and must match the saga it is handed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SagaId {
    value: String,
    id_type: String,
    saga_type: String,
}

impl SagaId {
    /// Creates an identifier.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if any part is empty.
    pub fn new(
        value: impl Into<String>,
        id_type: impl Into<String>,
        saga_type: impl Into<String>,
    ) -> Result<Self, ServiceBusError> {
        let id = Self {
            value: value.into(),
            id_type: id_type.into(),
            saga_type: saga_type.into(),
        };

        if id.value.trim().is_empty() {
            return Err(ServiceBusError::InvalidIdentifier(
                "saga identifier value must not be empty".to_owned(),
            ));
        }
        if id.id_type.trim().is_empty() || id.saga_type.trim().is_empty() {
            return Err(ServiceBusError::InvalidIdentifier(format!(
                "saga identifier {} must name its id type and saga type",
                id.value
            )));
        }

        Ok(id)
    }

    /// Creates an identifier issued for saga `S`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if `value` or `id_type` is
    /// empty.
    pub fn for_saga<S: Saga>(
        value: impl Into<String>,
        id_type: impl Into<String>,
    ) -> Result<Self, ServiceBusError> {
        Self::new(value, id_type, S::SAGA_TYPE)
    }

    /// Generates a random identifier for saga `S`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if `id_type` is empty.
    pub fn generate<S: Saga>(id_type: impl Into<String>) -> Result<Self, ServiceBusError> {
        Self::for_saga::<S>(Uuid::new_v4().to_string(), id_type)
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

    /// The saga type this identifier was issued for.
    #[must_use]
    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }
}

impl fmt::Display for SagaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_value() {
        let result = SagaId::new("  ", "orders.order_id", "orders.checkout");

        assert!(matches!(result, Err(ServiceBusError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_new_rejects_missing_saga_type() {
        let result = SagaId::new("o-1", "orders.order_id", "");

        assert!(matches!(result, Err(ServiceBusError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_display_is_the_value() {
        let id = SagaId::new("o-1", "orders.order_id", "orders.checkout").unwrap();

        assert_eq!(id.to_string(), "o-1");
        assert_eq!(id.id_type(), "orders.order_id");
        assert_eq!(id.saga_type(), "orders.checkout");
    }
}
