//! Message registry — restores type-erased messages from stored payloads.
//!
//! Built once at startup by explicit registration calls and then shared
//! read-only with the stores that need to decode persisted messages.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::ServiceBusError;
use crate::message::{Message, NamedMessage};

type Decoder =
    Box<dyn Fn(serde_json::Value) -> Result<Arc<dyn Message>, serde_json::Error> + Send + Sync>;

/// Maps `message_type` names to decoders.
#[derive(Default)]
pub struct MessageRegistry {
    decoders: HashMap<&'static str, Decoder>,
}

impl MessageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `M` under `M::MESSAGE_TYPE`.
    #[must_use]
    pub fn register<M>(mut self) -> Self
    where
        M: NamedMessage + DeserializeOwned,
    {
        self.decoders.insert(
            M::MESSAGE_TYPE,
            Box::new(|payload| {
                serde_json::from_value::<M>(payload)
                    .map(|message| Arc::new(message) as Arc<dyn Message>)
            }),
        );
        self
    }

    /// Returns `true` if `message_type` has a decoder.
    #[must_use]
    pub fn contains(&self, message_type: &str) -> bool {
        self.decoders.contains_key(message_type)
    }

    /// Decodes a JSON value into the message registered under `message_type`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::RestoreFailed` if the type is unknown, the
    /// payload does not match it, or the decoded message reports a type name
    /// other than the one it was registered under.
    pub fn decode_value(
        &self,
        message_type: &str,
        payload: serde_json::Value,
    ) -> Result<Arc<dyn Message>, ServiceBusError> {
        let decoder = self.decoders.get(message_type).ok_or_else(|| {
            ServiceBusError::RestoreFailed(format!("unknown message type: {message_type}"))
        })?;

        let message = decoder(payload).map_err(|e| {
            ServiceBusError::RestoreFailed(format!("malformed {message_type} payload: {e}"))
        })?;

        if message.message_type() != message_type {
            return Err(ServiceBusError::RestoreFailed(format!(
                "message registered as {message_type} names itself {}",
                message.message_type()
            )));
        }
        Ok(message)
    }

    /// Decodes raw JSON bytes into the message registered under `message_type`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::RestoreFailed` if the bytes are not JSON, the
    /// type is unknown or the payload does not match it.
    pub fn decode(
        &self,
        message_type: &str,
        payload: &[u8],
    ) -> Result<Arc<dyn Message>, ServiceBusError> {
        let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            ServiceBusError::RestoreFailed(format!("{message_type} payload is not JSON: {e}"))
        })?;
        self.decode_value(message_type, value)
    }
}

/// Serializes a message payload to JSON bytes.
#[must_use]
pub fn encode(message: &dyn Message) -> Vec<u8> {
    // Serializing a `serde_json::Value` cannot fail.
    serde_json::to_vec(&message.to_payload()).unwrap_or_default()
}

impl fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("MessageRegistry")
            .field("message_types", &names)
            .finish()
    }
}
