//! Execution context — the outbound boundary handlers and providers talk to.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ServiceBusError;
use crate::message::Message;

/// Context a message is processed in.
///
/// The transport binding behind it is an external collaborator; the runtime
/// only needs to hand it messages for publication (events) or sending
/// (commands).
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Deliver a message to the transport.
    async fn delivery(&self, message: Arc<dyn Message>) -> Result<(), ServiceBusError>;

    /// Deliver several messages in order, stopping at the first failure.
    async fn delivery_all(&self, messages: Vec<Arc<dyn Message>>) -> Result<(), ServiceBusError> {
        for message in messages {
            self.delivery(message).await?;
        }
        Ok(())
    }
}
