//! Aggregate event stream store boundary.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use servicebus_core::error::ServiceBusError;

use crate::id::AggregateId;
use crate::stream::StoredAggregateEventStream;

/// Side effect run as part of a stream write, e.g. publishing the stored events.
///
/// A failing handler fails the write. Whether the stored events are rolled
/// back depends on the store's [`CallbackPlacement`].
pub type AfterSaveHandler =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ServiceBusError>> + Send>;

/// Where a store runs the [`AfterSaveHandler`] of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallbackPlacement {
    /// After the write committed. The events stay stored when the handler
    /// fails, and the handler's error is reported wrapped in
    /// `ServiceBusError::PostCommitFailed`.
    #[default]
    AfterCommit,
    /// Before the write commits. A failing handler discards the whole write
    /// and its error is reported as is.
    InsideTransaction,
}

/// An [`AfterSaveHandler`] that does nothing.
#[must_use]
pub fn no_op_after_save() -> AfterSaveHandler {
    Box::new(|| future::ok::<(), ServiceBusError>(()).boxed())
}

/// Persistent storage for aggregate event streams.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Stores a new stream: its header and all of its events.
    ///
    /// # Errors
    ///
    /// `ServiceBusError::UniqueConstraintViolation` if the stream or an event
    /// id already exists, another storage error, or the handler's error
    /// (wrapped in `ServiceBusError::PostCommitFailed` if the events were
    /// committed regardless).
    async fn save_stream(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError>;

    /// Appends the events of `stream` to an existing stream.
    ///
    /// # Errors
    ///
    /// `ServiceBusError::UniqueConstraintViolation` on a duplicate playhead or
    /// event id, another storage error, or the handler's error (wrapped in
    /// `ServiceBusError::PostCommitFailed` if the events were committed
    /// regardless).
    async fn append_stream(
        &self,
        stream: &StoredAggregateEventStream,
        after_save: AfterSaveHandler,
    ) -> Result<(), ServiceBusError>;

    /// Loads a stream with events whose playhead is at least `from_version`
    /// and, when `to_version` is greater than `from_version`, at most
    /// `to_version`. Returns `None` if the stream does not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn load_stream(
        &self,
        id: &AggregateId,
        from_version: i64,
        to_version: Option<i64>,
    ) -> Result<Option<StoredAggregateEventStream>, ServiceBusError>;

    /// Marks a stream closed. Closing an absent or already closed stream is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn close_stream(&self, id: &AggregateId) -> Result<(), ServiceBusError>;
}
