//! Service Bus Indexes — scalar values looked up by `(index name, value key)`.
//!
//! Indexes map secondary keys, such as an email address, onto the identifier
//! of the aggregate or saga that owns them. An [`store::IndexStore`] keeps
//! one [`value::IndexValue`] per [`key::IndexKey`].

pub mod key;
pub mod store;
pub mod value;

pub use key::IndexKey;
pub use store::IndexStore;
pub use value::IndexValue;
