//! Service Bus Scheduler — commands deferred to a future execution date.
//!
//! Store operations take a post-action hook that runs inside the store's
//! transactional unit, so a hook failure undoes the store change.

pub mod contract;
pub mod id;
pub mod operation;
pub mod provider;
pub mod store;

pub use id::ScheduledOperationId;
pub use operation::{NextScheduledOperation, ScheduledOperation};
pub use provider::SchedulerProvider;
pub use store::{PostAdd, PostExtract, PostRemove, SchedulerStore};
