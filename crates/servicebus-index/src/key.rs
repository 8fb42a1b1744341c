//! Index entry key.

use std::fmt;

use servicebus_core::error::ServiceBusError;

/// Addresses one entry: the index it belongs to and the key within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    index_name: String,
    value_key: String,
}

impl IndexKey {
    /// Creates a key.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if either part is empty.
    pub fn new(
        index_name: impl Into<String>,
        value_key: impl Into<String>,
    ) -> Result<Self, ServiceBusError> {
        let key = Self {
            index_name: index_name.into(),
            value_key: value_key.into(),
        };

        if key.index_name.trim().is_empty() {
            return Err(ServiceBusError::InvalidIdentifier(
                "index name must not be empty".to_owned(),
            ));
        }
        if key.value_key.trim().is_empty() {
            return Err(ServiceBusError::InvalidIdentifier(format!(
                "value key in index {} must not be empty",
                key.index_name
            )));
        }

        Ok(key)
    }

    /// Name of the index.
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Key within the index.
    #[must_use]
    pub fn value_key(&self) -> &str {
        &self.value_key
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index_name, self.value_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_keeps_both_parts() {
        let key = IndexKey::new("customers.email", "ada@example.com").unwrap();

        assert_eq!(key.index_name(), "customers.email");
        assert_eq!(key.value_key(), "ada@example.com");
        assert_eq!(key.to_string(), "customers.email:ada@example.com");
    }

    #[test]
    fn test_empty_index_name_is_rejected() {
        let result = IndexKey::new("  ", "ada@example.com");

        assert!(matches!(result, Err(ServiceBusError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_empty_value_key_is_rejected() {
        let result = IndexKey::new("customers.email", "");

        assert!(matches!(result, Err(ServiceBusError::InvalidIdentifier(_))));
    }
}
