//! Test execution contexts — record or reject deliveries.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use servicebus_core::context::ExecutionContext;
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::Message;

/// A context that records every delivered message in order.
///
/// Optionally rejects one message type, to exercise rollback paths; a
/// rejected message is not recorded.
#[derive(Debug, Default)]
pub struct RecordingContext {
    delivered: Mutex<Vec<Arc<dyn Message>>>,
    reject: Option<&'static str>,
}

impl RecordingContext {
    /// Creates a context that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that fails when a message of `message_type` is
    /// delivered and records everything else.
    #[must_use]
    pub fn rejecting(message_type: &'static str) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            reject: Some(message_type),
        }
    }

    /// Returns a snapshot of the delivered messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delivered(&self) -> Vec<Arc<dyn Message>> {
        self.delivered.lock().unwrap().clone()
    }

    /// Returns the type names of the delivered messages, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delivered_types(&self) -> Vec<&'static str> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|message| message.message_type())
            .collect()
    }

    /// Returns the delivered messages of concrete type `M`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delivered_of<M: Message + Clone>(&self) -> Vec<M> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| message.as_ref().as_any().downcast_ref::<M>().cloned())
            .collect()
    }
}

#[async_trait]
impl ExecutionContext for RecordingContext {
    async fn delivery(&self, message: Arc<dyn Message>) -> Result<(), ServiceBusError> {
        if self.reject == Some(message.message_type()) {
            return Err(ServiceBusError::DeliveryFailed(format!(
                "transport rejected {}",
                message.message_type()
            )));
        }
        self.delivered.lock().unwrap().push(message);
        Ok(())
    }
}

/// A context whose transport is always down.
#[derive(Debug)]
pub struct FailingContext;

#[async_trait]
impl ExecutionContext for FailingContext {
    async fn delivery(&self, message: Arc<dyn Message>) -> Result<(), ServiceBusError> {
        Err(ServiceBusError::DeliveryFailed(format!(
            "transport unavailable for {}",
            message.message_type()
        )))
    }
}
