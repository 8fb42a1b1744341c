//! Test index store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use servicebus_core::error::ServiceBusError;
use servicebus_index::{IndexKey, IndexStore, IndexValue};

/// An index store that keeps entries in memory.
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    entries: Mutex<HashMap<IndexKey, IndexValue>>,
}

impl InMemoryIndexStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn find(&self, key: &IndexKey) -> Result<Option<IndexValue>, ServiceBusError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn add(&self, key: &IndexKey, value: &IndexValue) -> Result<(), ServiceBusError> {
        value.to_json()?;
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Err(ServiceBusError::UniqueConstraintViolation(format!(
                "index entry {key} already exists"
            )));
        }
        entries.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &IndexKey) -> Result<(), ServiceBusError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn update(&self, key: &IndexKey, value: &IndexValue) -> Result<(), ServiceBusError> {
        value.to_json()?;
        if let Some(stored) = self.entries.lock().unwrap().get_mut(key) {
            *stored = value.clone();
        }
        Ok(())
    }
}
