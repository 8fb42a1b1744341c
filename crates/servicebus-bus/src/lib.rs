//! Service Bus — message dispatch.
//!
//! Fans a message out to every handler registered for its runtime type and
//! runs them concurrently against a shared execution context.

pub mod bus;

pub use bus::{MessageBus, MessageBusBuilder};
