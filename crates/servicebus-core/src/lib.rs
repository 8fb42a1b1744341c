//! Service Bus Core — shared messaging abstractions.
//!
//! This crate defines the message traits, the execution context boundary,
//! the error taxonomy and the explicit registries every other crate of the
//! runtime depends on. It contains no infrastructure code.

pub mod apply;
pub mod clock;
pub mod context;
pub mod error;
pub mod message;
pub mod registry;
