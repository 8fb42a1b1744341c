//! Explicit event-applier registry.
//!
//! Each saga or aggregate type builds one `EventAppliers` table at startup,
//! mapping the runtime type of an event to the function that folds it into
//! in-memory state.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::message::Message;

type Applier<T> = Box<dyn Fn(&mut T, &dyn Any) + Send + Sync>;

/// Maps event types to the functions that apply them to a `T`.
pub struct EventAppliers<T> {
    appliers: HashMap<TypeId, Applier<T>>,
}

impl<T: 'static> EventAppliers<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            appliers: HashMap::new(),
        }
    }

    /// Registers the applier for events of type `E`, replacing any earlier one.
    #[must_use]
    pub fn on<E: Message>(mut self, applier: fn(&mut T, &E)) -> Self {
        self.appliers.insert(
            TypeId::of::<E>(),
            Box::new(move |target: &mut T, event: &dyn Any| {
                if let Some(event) = event.downcast_ref::<E>() {
                    applier(target, event);
                }
            }),
        );
        self
    }

    /// Applies `event` to `target`.
    ///
    /// Returns `false` when no applier is registered for the event's type;
    /// events may be raised purely for publication, so that is not an error.
    pub fn apply(&self, target: &mut T, event: &dyn Message) -> bool {
        let event = event.as_any();
        match self.appliers.get(&event.type_id()) {
            Some(applier) => {
                applier(target, event);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if an applier exists for `E`.
    #[must_use]
    pub fn handles<E: Message>(&self) -> bool {
        self.appliers.contains_key(&TypeId::of::<E>())
    }

    /// Number of registered appliers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.appliers.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.appliers.is_empty()
    }
}

impl<T: 'static> Default for EventAppliers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventAppliers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventAppliers")
            .field("appliers", &self.appliers.len())
            .finish()
    }
}
