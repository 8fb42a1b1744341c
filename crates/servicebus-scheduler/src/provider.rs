//! Scheduler provider — bridges the scheduler store to message delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use servicebus_core::clock::Clock;
use servicebus_core::context::ExecutionContext;
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::Command;
use tracing::{info, instrument};

use crate::contract::{OperationScheduled, SchedulerOperationCanceled, SchedulerOperationEmitted};
use crate::id::ScheduledOperationId;
use crate::operation::{NextScheduledOperation, ScheduledOperation};
use crate::store::{PostAdd, PostExtract, PostRemove, SchedulerStore};

/// Schedules, cancels and emits deferred commands.
///
/// Every delivery happens inside the store hook, so a delivery failure
/// undoes the corresponding store change.
pub struct SchedulerProvider {
    store: Arc<dyn SchedulerStore>,
    clock: Arc<dyn Clock>,
}

impl SchedulerProvider {
    /// Creates a provider over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SchedulerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Schedules `command` for `date` and delivers [`OperationScheduled`].
    ///
    /// # Errors
    ///
    /// `ServiceBusError::InvalidScheduledOperationExecutionDate` if `date` is
    /// not in the future, `ServiceBusError::UniqueConstraintViolation` if the
    /// id is taken, another storage error, or a delivery error.
    #[instrument(skip(self, command, context), fields(operation_id = %id, command_type = command.message_type()))]
    pub async fn schedule<C: Command>(
        &self,
        id: ScheduledOperationId,
        command: C,
        date: DateTime<Utc>,
        context: Arc<dyn ExecutionContext>,
    ) -> Result<(), ServiceBusError> {
        let operation = ScheduledOperation::new(id, command, date, self.clock.as_ref())?;

        let post_add: PostAdd = Box::new(
            move |operation: ScheduledOperation, next_operation: Option<NextScheduledOperation>| {
                async move {
                    let scheduled = OperationScheduled {
                        id: operation.id(),
                        command_type: operation.command().message_type().to_owned(),
                        execution_date: operation.date(),
                        next_operation,
                    };
                    context.delivery(Arc::new(scheduled)).await
                }
                .boxed()
            },
        );

        self.store.add(operation, post_add).await?;
        info!(execution_date = %date, "operation scheduled");
        Ok(())
    }

    /// Cancels an operation and delivers [`SchedulerOperationCanceled`].
    ///
    /// Returns whether the operation existed. The event is delivered either way.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a delivery error.
    #[instrument(skip(self, reason, context), fields(operation_id = %id))]
    pub async fn cancel(
        &self,
        id: ScheduledOperationId,
        reason: Option<String>,
        context: Arc<dyn ExecutionContext>,
    ) -> Result<bool, ServiceBusError> {
        let post_remove: PostRemove = Box::new(move |next_operation: Option<NextScheduledOperation>| {
            async move {
                let canceled = SchedulerOperationCanceled {
                    id,
                    reason,
                    next_operation,
                };
                context.delivery(Arc::new(canceled)).await
            }
            .boxed()
        });

        let removed = self.store.remove(id, post_remove).await?;
        info!(removed, "operation canceled");
        Ok(removed)
    }

    /// Extracts a due operation, delivers its command and then
    /// [`SchedulerOperationEmitted`].
    ///
    /// # Errors
    ///
    /// `ServiceBusError::NotFound` if the operation does not exist (it may
    /// already have been emitted or canceled), another storage error, or a
    /// delivery error.
    #[instrument(skip(self, context), fields(operation_id = %id))]
    pub async fn emit(
        &self,
        id: ScheduledOperationId,
        context: Arc<dyn ExecutionContext>,
    ) -> Result<(), ServiceBusError> {
        let post_extract: PostExtract = Box::new(
            move |operation: ScheduledOperation, next_operation: Option<NextScheduledOperation>| {
                async move {
                    context.delivery(Arc::clone(operation.command())).await?;
                    let emitted = SchedulerOperationEmitted {
                        id: operation.id(),
                        next_operation,
                    };
                    context.delivery(Arc::new(emitted)).await
                }
                .boxed()
            },
        );

        self.store.extract(id, post_extract).await?;
        info!("operation emitted");
        Ok(())
    }
}

impl std::fmt::Debug for SchedulerProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerProvider").finish_non_exhaustive()
    }
}
