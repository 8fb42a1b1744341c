//! Error taxonomy shared by every component of the runtime.

use thiserror::Error;

/// Top-level error type.
///
/// Storage failures keep their four distinct kinds so callers can tell a
/// lost connection from a duplicate key. Absence of a record in load-style
/// operations is never reported through this type; those operations return
/// `Option` instead.
#[derive(Debug, Error)]
pub enum ServiceBusError {
    /// The storage backend could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The storage backend rejected or failed to execute a statement.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// A unique constraint (duplicate stream, saga or operation id) was violated.
    #[error("unique constraint violation: {0}")]
    UniqueConstraintViolation(String),

    /// Any other failure while talking to the storage backend.
    #[error("storage interaction failed: {0}")]
    StorageInteractionFailed(String),

    /// A record that must exist was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An identifier does not belong to the entity it was handed to.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The saga is already completed or failed.
    #[error("saga {0} is closed")]
    SagaClosed(String),

    /// A scheduled operation was created with an execution date that is not
    /// in the future.
    #[error("invalid scheduled operation execution date: {0}")]
    InvalidScheduledOperationExecutionDate(String),

    /// Persisted data could not be turned back into a domain object.
    #[error("restore failed: {0}")]
    RestoreFailed(String),

    /// A message handler reported a failure.
    #[error("handler for {message_type} failed: {reason}")]
    HandlerFailed {
        /// The message type the handler was registered for.
        message_type: String,
        /// Human-readable failure description.
        reason: String,
    },

    /// The execution context could not deliver an outgoing message.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// The write was committed, but a step that runs after commit (such as
    /// publishing the stored events) failed. Retrying the write would
    /// duplicate it.
    #[error("committed, but a post-commit step failed: {0}")]
    PostCommitFailed(#[source] Box<ServiceBusError>),
}

impl ServiceBusError {
    /// Returns `true` for the four storage-layer kinds.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::OperationFailed(_)
                | Self::UniqueConstraintViolation(_)
                | Self::StorageInteractionFailed(_)
        )
    }

    /// Wraps `self` as the failure of a step that ran after a commit.
    #[must_use]
    pub fn after_commit(self) -> Self {
        match self {
            Self::PostCommitFailed(_) => self,
            other => Self::PostCommitFailed(Box::new(other)),
        }
    }

    /// Returns `true` if the failed operation's write was nevertheless committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::PostCommitFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kinds_are_storage_errors() {
        assert!(ServiceBusError::ConnectionFailed("down".into()).is_storage_error());
        assert!(ServiceBusError::OperationFailed("syntax".into()).is_storage_error());
        assert!(ServiceBusError::UniqueConstraintViolation("dup".into()).is_storage_error());
        assert!(ServiceBusError::StorageInteractionFailed("decode".into()).is_storage_error());
    }

    #[test]
    fn test_application_kinds_are_not_storage_errors() {
        assert!(!ServiceBusError::SagaClosed("id".into()).is_storage_error());
        assert!(!ServiceBusError::RestoreFailed("bad payload".into()).is_storage_error());
        assert!(!ServiceBusError::NotFound("op".into()).is_storage_error());
    }

    #[test]
    fn test_handler_failed_display_names_message_type() {
        let err = ServiceBusError::HandlerFailed {
            message_type: "orders.place_order".into(),
            reason: "boom".into(),
        };

        assert_eq!(err.to_string(), "handler for orders.place_order failed: boom");
    }

    #[test]
    fn test_after_commit_wraps_once_and_keeps_the_cause() {
        let err = ServiceBusError::DeliveryFailed("broker down".into())
            .after_commit()
            .after_commit();

        assert!(err.is_committed());
        assert!(!err.is_storage_error());
        let ServiceBusError::PostCommitFailed(cause) = &err else {
            panic!("expected PostCommitFailed, got {err:?}");
        };
        assert!(matches!(**cause, ServiceBusError::DeliveryFailed(_)));
        assert_eq!(
            err.to_string(),
            "committed, but a post-commit step failed: delivery failed: broker down"
        );
    }
}
