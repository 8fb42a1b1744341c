//! Saga persistence boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use servicebus_core::error::ServiceBusError;

use crate::id::SagaId;
use crate::saga::Saga;
use crate::status::SagaStatus;

/// Serialized snapshot of a saga as the store keeps it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSaga {
    /// Saga identifier.
    pub id: SagaId,
    /// Status at the time of the snapshot.
    pub status: SagaStatus,
    /// Serialized saga (JSON bytes).
    pub payload: Vec<u8>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiration time.
    pub expiration_date: DateTime<Utc>,
    /// Close time, if the saga is closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl StoredSaga {
    /// Snapshots `saga`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::StorageInteractionFailed` if the saga cannot
    /// be serialized.
    pub fn from_saga<S: Saga>(saga: &S) -> Result<Self, ServiceBusError> {
        let payload = serde_json::to_vec(saga).map_err(|e| {
            ServiceBusError::StorageInteractionFailed(format!(
                "saga {} serialization failed: {e}",
                saga.id()
            ))
        })?;
        let core = saga.core();

        Ok(Self {
            id: core.id().clone(),
            status: core.status(),
            payload,
            created_at: core.created_at(),
            expiration_date: core.expire_date(),
            closed_at: core.closed_at(),
        })
    }

    /// Restores the saga from the snapshot with a fresh, empty outbox.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::RestoreFailed` if the payload cannot be
    /// deserialized into `S` or belongs to another saga type.
    pub fn restore<S: Saga>(&self) -> Result<S, ServiceBusError> {
        if self.id.saga_type() != S::SAGA_TYPE {
            return Err(ServiceBusError::RestoreFailed(format!(
                "saga {} is a {} snapshot, not {}",
                self.id,
                self.id.saga_type(),
                S::SAGA_TYPE
            )));
        }

        let mut saga: S = serde_json::from_slice(&self.payload).map_err(|e| {
            ServiceBusError::RestoreFailed(format!("saga {} payload is corrupt: {e}", self.id))
        })?;
        saga.core_mut().attach_outbox();
        Ok(saga)
    }
}

/// Storage for saga snapshots keyed by [`SagaId`].
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Stores a new saga.
    ///
    /// # Errors
    ///
    /// `ServiceBusError::UniqueConstraintViolation` if the identity already
    /// exists, or a storage error.
    async fn save(&self, saga: &StoredSaga) -> Result<(), ServiceBusError>;

    /// Replaces the snapshot of an existing saga. Updating an absent saga is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn update(&self, saga: &StoredSaga) -> Result<(), ServiceBusError>;

    /// Loads a snapshot, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `ServiceBusError::RestoreFailed` if the
    /// stored row cannot be read back.
    async fn load(&self, id: &SagaId) -> Result<Option<StoredSaga>, ServiceBusError>;

    /// Removes a saga. Removing an absent saga is not an error.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn remove(&self, id: &SagaId) -> Result<(), ServiceBusError>;
}
