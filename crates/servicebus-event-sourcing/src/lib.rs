//! Service Bus Event Sourcing — aggregates rebuilt from their event streams.
//!
//! An [`aggregate::Aggregate`] records the events it raises with their
//! playhead. The [`provider::EventSourcingProvider`] turns those into a
//! [`stream::StoredAggregateEventStream`], hands it to an
//! [`store::AggregateStore`] and publishes the events once they are stored.

pub mod aggregate;
pub mod contract;
pub mod id;
pub mod provider;
pub mod store;
pub mod stream;

pub use aggregate::{Aggregate, AggregateCore, PendingEvent};
pub use id::AggregateId;
pub use provider::EventSourcingProvider;
pub use store::{AfterSaveHandler, AggregateStore, CallbackPlacement};
pub use stream::{START_PLAYHEAD_INDEX, StoredAggregateEvent, StoredAggregateEventStream};
