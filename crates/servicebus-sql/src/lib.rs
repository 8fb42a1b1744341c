//! `PostgreSQL` storage for the service bus runtime.
//!
//! Implements the aggregate, saga, scheduler and index store boundaries on
//! top of sqlx. Every write runs in its own transaction that is committed
//! on success and rolled back on any failure before the error is returned.

pub mod config;
pub mod error;
pub mod event_stream_store;
pub mod index_store;
pub mod saga_store;
pub mod scheduler_store;
pub mod schema;

mod transaction;

pub use config::{ConfigError, StorageConfig};
pub use event_stream_store::SqlEventStreamStore;
pub use index_store::SqlIndexStore;
pub use saga_store::SqlSagaStore;
pub use scheduler_store::SqlSchedulerStore;
pub use schema::migrate;
pub use servicebus_event_sourcing::CallbackPlacement;
