//! Saga provider — starts, loads and persists sagas and flushes their outbox.

use std::sync::Arc;

use chrono::Duration;
use servicebus_core::clock::Clock;
use servicebus_core::context::ExecutionContext;
use servicebus_core::error::ServiceBusError;
use tracing::{debug, info, instrument};

use crate::id::SagaId;
use crate::saga::{Saga, default_expiration};
use crate::store::{SagaStore, StoredSaga};

/// Coordinates saga persistence with message delivery.
///
/// Every write stores the snapshot first; only once the store accepted it
/// are the fired commands and then the raised events handed to the
/// execution context.
pub struct SagaProvider {
    store: Arc<dyn SagaStore>,
    clock: Arc<dyn Clock>,
    default_expiration: Duration,
}

impl SagaProvider {
    /// Creates a provider over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SagaStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            default_expiration: default_expiration(),
        }
    }

    /// Overrides the expiration offset applied to new sagas.
    #[must_use]
    pub fn with_default_expiration(mut self, expiration: Duration) -> Self {
        self.default_expiration = expiration;
        self
    }

    /// Creates a saga, runs its start logic, stores it and flushes its outbox.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::InvalidIdentifier` if `id` belongs to another
    /// saga type, `ServiceBusError::UniqueConstraintViolation` if the saga
    /// already exists, any error the start logic reports, a storage error, or
    /// a delivery error.
    #[instrument(skip(self, id, command, context), fields(saga_id = %id, saga_type = S::SAGA_TYPE))]
    pub async fn start<S: Saga>(
        &self,
        id: SagaId,
        command: &S::StartCommand,
        context: &dyn ExecutionContext,
    ) -> Result<S, ServiceBusError> {
        let expire_date = self.clock.now() + self.default_expiration;
        let mut saga = S::create(id, Some(expire_date), self.clock.as_ref())?;
        saga.start(command, self.clock.as_ref())?;

        self.store.save(&StoredSaga::from_saga(&saga)?).await?;
        self.flush(&mut saga, context).await?;

        info!(expire_date = %expire_date, "saga started");
        Ok(saga)
    }

    /// Loads a saga, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::RestoreFailed` if the stored snapshot cannot
    /// be turned back into `S`, or a storage error.
    #[instrument(skip(self, id), fields(saga_id = %id, saga_type = S::SAGA_TYPE))]
    pub async fn obtain<S: Saga>(&self, id: &SagaId) -> Result<Option<S>, ServiceBusError> {
        let Some(stored) = self.store.load(id).await? else {
            debug!("saga not found");
            return Ok(None);
        };

        stored.restore::<S>().map(Some)
    }

    /// Stores the current state of an existing saga and flushes its outbox.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or a delivery error.
    #[instrument(skip(self, saga, context), fields(saga_id = %saga.id(), status = %saga.status()))]
    pub async fn save<S: Saga>(
        &self,
        saga: &mut S,
        context: &dyn ExecutionContext,
    ) -> Result<(), ServiceBusError> {
        self.store.update(&StoredSaga::from_saga(saga)?).await?;
        self.flush(saga, context).await
    }

    /// Removes a saga. Removing an absent saga is not an error.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self, id), fields(saga_id = %id))]
    pub async fn remove(&self, id: &SagaId) -> Result<(), ServiceBusError> {
        self.store.remove(id).await
    }

    async fn flush<S: Saga>(
        &self,
        saga: &mut S,
        context: &dyn ExecutionContext,
    ) -> Result<(), ServiceBusError> {
        let (commands, events) = saga.core_mut().take_outbox().into_parts();
        debug!(
            commands = commands.len(),
            events = events.len(),
            "flushing saga outbox"
        );

        context.delivery_all(commands).await?;
        context.delivery_all(events).await
    }
}

impl std::fmt::Debug for SagaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaProvider")
            .field("default_expiration", &self.default_expiration)
            .finish_non_exhaustive()
    }
}
