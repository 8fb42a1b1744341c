//! Scheduler store boundary.

use async_trait::async_trait;
use futures::future::BoxFuture;
use servicebus_core::error::ServiceBusError;

use crate::id::ScheduledOperationId;
use crate::operation::{NextScheduledOperation, ScheduledOperation};

/// Runs after an operation was added, with the stored operation and the
/// soonest pending operation.
pub type PostAdd = Box<
    dyn FnOnce(
            ScheduledOperation,
            Option<NextScheduledOperation>,
        ) -> BoxFuture<'static, Result<(), ServiceBusError>>
        + Send,
>;

/// Runs after an operation was extracted, with the extracted operation and
/// the soonest pending operation left.
pub type PostExtract = Box<
    dyn FnOnce(
            ScheduledOperation,
            Option<NextScheduledOperation>,
        ) -> BoxFuture<'static, Result<(), ServiceBusError>>
        + Send,
>;

/// Runs after a removal with the soonest pending operation left.
pub type PostRemove = Box<
    dyn FnOnce(Option<NextScheduledOperation>) -> BoxFuture<'static, Result<(), ServiceBusError>>
        + Send,
>;

/// Persistent storage for scheduled operations.
///
/// Each operation runs its hook inside the same transactional unit as the
/// store change; a hook failure undoes the change. Whenever a next operation
/// is handed to a hook it is flagged as sent.
#[async_trait]
pub trait SchedulerStore: Send + Sync {
    /// Stores a new operation, then runs `post_add`.
    ///
    /// # Errors
    ///
    /// `ServiceBusError::UniqueConstraintViolation` if the id already exists,
    /// another storage error, or the hook's error.
    async fn add(
        &self,
        operation: ScheduledOperation,
        post_add: PostAdd,
    ) -> Result<(), ServiceBusError>;

    /// Loads and deletes an operation, then runs `post_extract`.
    ///
    /// # Errors
    ///
    /// `ServiceBusError::NotFound` if the id does not exist,
    /// `ServiceBusError::RestoreFailed` if the stored command cannot be
    /// decoded, another storage error, or the hook's error.
    async fn extract(
        &self,
        id: ScheduledOperationId,
        post_extract: PostExtract,
    ) -> Result<(), ServiceBusError>;

    /// Deletes an operation if it exists, then runs `post_remove`. Returns
    /// whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns a storage error or the hook's error.
    async fn remove(
        &self,
        id: ScheduledOperationId,
        post_remove: PostRemove,
    ) -> Result<bool, ServiceBusError>;
}
