//! Test saga stores.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use servicebus_core::error::ServiceBusError;
use servicebus_sagas::{SagaId, SagaStore, StoredSaga};

/// A saga store that keeps snapshots in memory, keyed like the SQL store by
/// `(value, id_type)`.
#[derive(Debug, Default)]
pub struct InMemorySagaStore {
    sagas: Mutex<HashMap<(String, String), StoredSaga>>,
}

impl InMemorySagaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored snapshot for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, id: &SagaId) -> Option<StoredSaga> {
        self.sagas.lock().unwrap().get(&key(id)).cloned()
    }

    /// Number of stored sagas.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.sagas.lock().unwrap().len()
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

fn key(id: &SagaId) -> (String, String) {
    (id.value().to_owned(), id.id_type().to_owned())
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn save(&self, saga: &StoredSaga) -> Result<(), ServiceBusError> {
        let mut sagas = self.sagas.lock().unwrap();
        let key = key(&saga.id);
        if sagas.contains_key(&key) {
            return Err(ServiceBusError::UniqueConstraintViolation(format!(
                "saga {} already exists",
                saga.id
            )));
        }
        sagas.insert(key, saga.clone());
        Ok(())
    }

    async fn update(&self, saga: &StoredSaga) -> Result<(), ServiceBusError> {
        if let Some(stored) = self.sagas.lock().unwrap().get_mut(&key(&saga.id)) {
            *stored = saga.clone();
        }
        Ok(())
    }

    async fn load(&self, id: &SagaId) -> Result<Option<StoredSaga>, ServiceBusError> {
        Ok(self.get(id))
    }

    async fn remove(&self, id: &SagaId) -> Result<(), ServiceBusError> {
        self.sagas.lock().unwrap().remove(&key(id));
        Ok(())
    }
}

/// A saga store that always fails with a connection error.
#[derive(Debug)]
pub struct FailingSagaStore;

#[async_trait]
impl SagaStore for FailingSagaStore {
    async fn save(&self, _saga: &StoredSaga) -> Result<(), ServiceBusError> {
        Err(ServiceBusError::ConnectionFailed("connection refused".into()))
    }

    async fn update(&self, _saga: &StoredSaga) -> Result<(), ServiceBusError> {
        Err(ServiceBusError::ConnectionFailed("connection refused".into()))
    }

    async fn load(&self, _id: &SagaId) -> Result<Option<StoredSaga>, ServiceBusError> {
        Err(ServiceBusError::ConnectionFailed("connection refused".into()))
    }

    async fn remove(&self, _id: &SagaId) -> Result<(), ServiceBusError> {
        Err(ServiceBusError::ConnectionFailed("connection refused".into()))
    }
}
