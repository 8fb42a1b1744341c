//! Index persistence boundary.

use async_trait::async_trait;
use servicebus_core::error::ServiceBusError;

use crate::key::IndexKey;
use crate::value::IndexValue;

/// Persistent storage for index entries, one value per [`IndexKey`].
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Returns the value stored under `key`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or `ServiceBusError::RestoreFailed` if the
    /// stored value is not a scalar.
    async fn find(&self, key: &IndexKey) -> Result<Option<IndexValue>, ServiceBusError>;

    /// Stores `value` under a key that is not in use yet.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::UniqueConstraintViolation` if `key` already
    /// holds a value, or another storage error.
    async fn add(&self, key: &IndexKey, value: &IndexValue) -> Result<(), ServiceBusError>;

    /// Removes the entry under `key`. Removing an absent entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn delete(&self, key: &IndexKey) -> Result<(), ServiceBusError>;

    /// Replaces the value under `key`. Updating an absent entry is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn update(&self, key: &IndexKey, value: &IndexValue) -> Result<(), ServiceBusError>;
}
