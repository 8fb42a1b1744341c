//! Message abstractions.
//!
//! A message is an immutable value whose identity is its runtime type.
//! Commands are addressed to one intended handler, events to zero or more.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Type-erasure helpers implemented for every `'static` value.
///
/// Lets an `Arc<dyn Message>` be routed by its concrete `TypeId` and
/// downcast back to the concrete message type.
pub trait AsAny: Any + Send + Sync {
    /// Borrow as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared message into a shared `Any`.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Trait that all messages implement.
pub trait Message: AsAny + Debug {
    /// The stable type name for this message (for logging/routing/storage).
    fn message_type(&self) -> &'static str;

    /// Serializes the message payload to JSON.
    fn to_payload(&self) -> serde_json::Value;
}

/// A message whose stable type name is known without an instance.
///
/// Required to register a message for decoding, so the registry key and the
/// stored name come from the same constant. Implementations return
/// `Self::MESSAGE_TYPE` from [`Message::message_type`].
pub trait NamedMessage: Message {
    /// The stable type name, as returned by [`Message::message_type`].
    const MESSAGE_TYPE: &'static str;
}

/// A message carrying intent, expected to be handled exactly once.
pub trait Command: Message {}

/// A message recording a fact, delivered to any number of listeners.
pub trait Event: Message {}

/// Returns the `TypeId` of the concrete message behind a trait object.
#[must_use]
pub fn runtime_type_id(message: &dyn Message) -> std::any::TypeId {
    message.as_any().type_id()
}
