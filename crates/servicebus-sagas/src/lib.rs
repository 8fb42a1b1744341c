//! Service Bus Sagas — long-running processes driven by events and commands.
//!
//! A saga records the events it raises and the commands it fires in a
//! transient outbox. The [`provider::SagaProvider`] persists the saga through
//! a [`store::SagaStore`] and then flushes that outbox to the execution
//! context.

pub mod contract;
pub mod id;
pub mod provider;
pub mod saga;
pub mod status;
pub mod store;

pub use id::SagaId;
pub use provider::SagaProvider;
pub use saga::{Saga, SagaCore, SagaOutbox};
pub use status::SagaStatus;
pub use store::{SagaStore, StoredSaga};
