//! Mapping of sqlx failures onto the storage error kinds.

use servicebus_core::error::ServiceBusError;

/// SQLSTATE reported by `PostgreSQL` for a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Classifies a sqlx error into one of the four storage error kinds.
#[must_use]
pub fn storage_error(error: sqlx::Error) -> ServiceBusError {
    if let Some(db_err) = error.as_database_error() {
        if db_err.code().is_some_and(|code| code == UNIQUE_VIOLATION) {
            return ServiceBusError::UniqueConstraintViolation(db_err.message().to_owned());
        }
        return ServiceBusError::OperationFailed(db_err.message().to_owned());
    }

    match error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => ServiceBusError::ConnectionFailed(error.to_string()),
        other => ServiceBusError::StorageInteractionFailed(other.to_string()),
    }
}
