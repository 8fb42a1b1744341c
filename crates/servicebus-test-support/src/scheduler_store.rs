//! Test scheduler store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use servicebus_core::error::ServiceBusError;
use servicebus_scheduler::{
    NextScheduledOperation, PostAdd, PostExtract, PostRemove, ScheduledOperation,
    ScheduledOperationId, SchedulerStore,
};

type Operations = HashMap<ScheduledOperationId, ScheduledOperation>;

/// A scheduler store that keeps operations in memory.
///
/// Each call snapshots the table, applies its change, runs the hook and
/// restores the snapshot if the hook fails.
#[derive(Debug, Default)]
pub struct InMemorySchedulerStore {
    operations: Mutex<Operations>,
}

impl InMemorySchedulerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored operation with `id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn get(&self, id: ScheduledOperationId) -> Option<ScheduledOperation> {
        self.operations.lock().unwrap().get(&id).cloned()
    }

    /// Number of stored operations.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn len(&self) -> usize {
        self.operations.lock().unwrap().len()
    }

    /// Returns `true` if nothing is stored.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn restore(&self, snapshot: Operations) {
        *self.operations.lock().unwrap() = snapshot;
    }
}

/// Picks the soonest unsent operation and flags it as sent.
fn take_next(operations: &mut Operations) -> Option<NextScheduledOperation> {
    let next = operations
        .values()
        .filter(|operation| !operation.is_sent())
        .min_by_key(|operation| operation.date())
        .map(NextScheduledOperation::from)?;

    if let Some(operation) = operations.get_mut(&next.id) {
        *operation = ScheduledOperation::restore(
            operation.id(),
            Arc::clone(operation.command()),
            operation.date(),
            true,
        );
    }
    Some(next)
}

#[async_trait]
impl SchedulerStore for InMemorySchedulerStore {
    async fn add(
        &self,
        operation: ScheduledOperation,
        post_add: PostAdd,
    ) -> Result<(), ServiceBusError> {
        let (snapshot, stored, next) = {
            let mut operations = self.operations.lock().unwrap();
            if operations.contains_key(&operation.id()) {
                return Err(ServiceBusError::UniqueConstraintViolation(format!(
                    "scheduled operation {} already exists",
                    operation.id()
                )));
            }
            let snapshot = operations.clone();
            operations.insert(operation.id(), operation.clone());
            let next = take_next(&mut operations);
            (snapshot, operation, next)
        };

        if let Err(e) = post_add(stored, next).await {
            self.restore(snapshot);
            return Err(e);
        }
        Ok(())
    }

    async fn extract(
        &self,
        id: ScheduledOperationId,
        post_extract: PostExtract,
    ) -> Result<(), ServiceBusError> {
        let (snapshot, extracted, next) = {
            let mut operations = self.operations.lock().unwrap();
            let snapshot = operations.clone();
            let extracted = operations.remove(&id).ok_or_else(|| {
                ServiceBusError::NotFound(format!("scheduled operation {id}"))
            })?;
            let next = take_next(&mut operations);
            (snapshot, extracted, next)
        };

        if let Err(e) = post_extract(extracted, next).await {
            self.restore(snapshot);
            return Err(e);
        }
        Ok(())
    }

    async fn remove(
        &self,
        id: ScheduledOperationId,
        post_remove: PostRemove,
    ) -> Result<bool, ServiceBusError> {
        let (snapshot, removed, next) = {
            let mut operations = self.operations.lock().unwrap();
            let snapshot = operations.clone();
            let removed = operations.remove(&id).is_some();
            let next = take_next(&mut operations);
            (snapshot, removed, next)
        };

        if let Err(e) = post_remove(next).await {
            self.restore(snapshot);
            return Err(e);
        }
        Ok(removed)
    }
}
