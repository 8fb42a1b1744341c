//! Shared test mocks and utilities for the service bus runtime.

mod aggregate_store;
mod clock;
mod context;
mod index_store;
mod saga_store;
mod scheduler_store;

pub use aggregate_store::InMemoryAggregateStore;
pub use clock::FixedClock;
pub use context::{FailingContext, RecordingContext};
pub use index_store::InMemoryIndexStore;
pub use saga_store::{FailingSagaStore, InMemorySagaStore};
pub use scheduler_store::InMemorySchedulerStore;
