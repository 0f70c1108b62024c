//! # Handler Inventories
//!
//! A [`HandlerInventory`] is a bundle of registrations applied to a
//! [`DispatcherBuilder`] in one call, so feature modules can expose their
//! handlers without the composition root naming each one.

use mediator_types::DispatchResult;

use crate::dispatcher::DispatcherBuilder;

/// A set of handler and behavior registrations.
pub trait HandlerInventory {
    /// Apply every registration to `builder`.
    ///
    /// # Errors
    ///
    /// Propagates `Conflict` from duplicate command or stream handlers.
    fn register(&self, builder: &mut DispatcherBuilder) -> DispatchResult<()>;
}

impl<F> HandlerInventory for F
where
    F: Fn(&mut DispatcherBuilder) -> DispatchResult<()>,
{
    fn register(&self, builder: &mut DispatcherBuilder) -> DispatchResult<()> {
        self(builder)
    }
}
