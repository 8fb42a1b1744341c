//! Message bus — routes a message to the handlers registered for its type.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use servicebus_core::error::ServiceBusError;
use servicebus_core::message::{Message, runtime_type_id};
use tracing::{debug, error, instrument};

type Handler<C> = Arc<
    dyn Fn(Arc<dyn Message>, Arc<C>) -> BoxFuture<'static, Result<(), ServiceBusError>>
        + Send
        + Sync,
>;

/// Collects handler registrations and freezes them into a [`MessageBus`].
pub struct MessageBusBuilder<C: ?Sized> {
    handlers: HashMap<TypeId, Vec<Handler<C>>>,
}

impl<C> MessageBusBuilder<C>
where
    C: ?Sized + Send + Sync + 'static,
{
    /// Creates a builder with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for messages of type `M`.
    ///
    /// Several handlers may be registered for the same type; they are invoked
    /// in registration order and then run concurrently.
    #[must_use]
    pub fn register<M, F, Fut>(mut self, handler: F) -> Self
    where
        M: Message,
        F: Fn(Arc<M>, Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ServiceBusError>> + Send + 'static,
    {
        let erased: Handler<C> = Arc::new(move |message: Arc<dyn Message>, context: Arc<C>| {
            let message_type = message.message_type();
            match message.into_any_arc().downcast::<M>() {
                Ok(message) => handler(message, context).boxed(),
                Err(_) => future::ready(Err(ServiceBusError::HandlerFailed {
                    message_type: message_type.to_owned(),
                    reason: "message routed to a handler of another type".to_owned(),
                }))
                .boxed(),
            }
        });

        self.handlers
            .entry(TypeId::of::<M>())
            .or_default()
            .push(erased);
        self
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> MessageBus<C> {
        MessageBus {
            handlers: self.handlers,
        }
    }
}

impl<C> Default for MessageBusBuilder<C>
where
    C: ?Sized + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable message router with fan-out semantics.
pub struct MessageBus<C: ?Sized> {
    handlers: HashMap<TypeId, Vec<Handler<C>>>,
}

impl<C> MessageBus<C>
where
    C: ?Sized + Send + Sync + 'static,
{
    /// Starts building a bus.
    #[must_use]
    pub fn builder() -> MessageBusBuilder<C> {
        MessageBusBuilder::new()
    }

    /// Handles a message.
    ///
    /// Every handler registered for the message's runtime type is invoked with
    /// the same message and context. The handlers run concurrently and the
    /// call completes once all of them have completed. A failing handler does
    /// not cancel its siblings; the first failure observed is returned after
    /// the rest have finished. A message without handlers is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by any handler.
    #[instrument(skip(self, message, context), fields(message_type = message.message_type()))]
    pub async fn handle(
        &self,
        message: Arc<dyn Message>,
        context: Arc<C>,
    ) -> Result<(), ServiceBusError> {
        let message_type = message.message_type();

        let Some(handlers) = self.handlers.get(&runtime_type_id(message.as_ref())) else {
            debug!(message_type, "no handlers found for message");
            return Ok(());
        };

        let mut running: FuturesUnordered<_> = handlers
            .iter()
            .map(|handler| handler(Arc::clone(&message), Arc::clone(&context)))
            .collect();

        let mut first_failure = None;
        while let Some(outcome) = running.next().await {
            if let Err(e) = outcome {
                error!(message_type, error = %e, "message handler failed");
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Handles a concrete message value.
    ///
    /// # Errors
    ///
    /// See [`MessageBus::handle`].
    pub async fn dispatch<M: Message>(
        &self,
        message: M,
        context: Arc<C>,
    ) -> Result<(), ServiceBusError> {
        self.handle(Arc::new(message), context).await
    }

    /// Returns `true` if at least one handler is registered for `message`'s type.
    #[must_use]
    pub fn has_handlers(&self, message: &dyn Message) -> bool {
        self.handlers
            .get(&runtime_type_id(message))
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Number of handlers registered for `M`.
    #[must_use]
    pub fn handlers_count<M: Message>(&self) -> usize {
        self.handlers.get(&TypeId::of::<M>()).map_or(0, Vec::len)
    }
}

impl<C: ?Sized> fmt::Debug for MessageBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("message_types", &self.handlers.len())
            .field(
                "handlers",
                &self.handlers.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
