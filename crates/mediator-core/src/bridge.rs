//! # Type-Erasure Bridge
//!
//! Every `Any` downcast in the crate lives in this module.
//!
//! The behavior pipeline is shared by all command shapes, so requests and
//! responses travel through it as opaque values tagged with their
//! [`CommandShape`]. They are re-specialised to concrete types only
//! immediately before a closed behavior or the terminal handler runs, and
//! again when `send` hands the response back to its caller.
//!
//! ```text
//!   send::<C>(command)
//!        │ box_command::<C>
//!        ▼
//!   ErasedCommand ──► open behavior ──► closed behavior ──► terminal
//!                                        │ unbox_command      │ unbox_command
//!                                        ▼                    ▼
//!                                     Behavior<C>       CommandHandler<C>
//!                                        │ box_response       │ box_response
//!        ▲                               ▼                    ▼
//!        │ unbox_response::<C>      ErasedResponse ◄──────────┘
//!   C::Response
//! ```
//!
//! The registry stores handlers the same way: each entry is an
//! `Arc<dyn …Handler<M>>` behind `Box<dyn Any>`, recovered with
//! [`ErasedHandler::typed`].

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use mediator_types::{Command, CommandShape, DispatchError, DispatchResult, TypeKey};

/// Boxed command value that can duplicate itself without knowing its type.
trait CommandValue: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    fn clone_boxed(&self) -> Box<dyn CommandValue>;
}

impl<C: Command> CommandValue for C {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn CommandValue> {
        Box::new(self.clone())
    }
}

/// A command travelling through the pipeline as an opaque value.
///
/// Only [`box_command`] constructs one, so [`ErasedCommand::shape`] always
/// describes the boxed value. Cloning clones the underlying command, which is
/// how an open behavior retries the rest of the pipeline.
pub struct ErasedCommand {
    shape: CommandShape,
    value: Box<dyn CommandValue>,
}

impl Clone for ErasedCommand {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape,
            value: self.value.clone_boxed(),
        }
    }
}

impl ErasedCommand {
    /// Runtime shape (command and response keys).
    #[must_use]
    pub fn shape(&self) -> &CommandShape {
        &self.shape
    }

    /// Key of the boxed command type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.shape.command
    }

    /// Whether the boxed command is a `C`.
    #[must_use]
    pub fn is<C: Command>(&self) -> bool {
        self.shape.command.is::<C>()
    }

    /// Borrow the command as `C`, if that is what it is.
    #[must_use]
    pub fn downcast_ref<C: Command>(&self) -> Option<&C> {
        self.value.as_any().downcast_ref::<C>()
    }
}

impl fmt::Debug for ErasedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedCommand")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// A response travelling back out through the pipeline.
///
/// Open behaviors that short-circuit build one with [`ErasedResponse::new`];
/// if the value is not the command's response type, `send` fails with
/// [`DispatchError::TypeMismatch`].
pub struct ErasedResponse {
    key: TypeKey,
    value: Box<dyn Any + Send>,
}

impl ErasedResponse {
    /// Box a response value.
    #[must_use]
    pub fn new<R: Send + 'static>(value: R) -> Self {
        Self {
            key: TypeKey::of::<R>(),
            value: Box::new(value),
        }
    }

    /// Key of the boxed value's type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Whether the boxed value is an `R`.
    #[must_use]
    pub fn is<R: Send + 'static>(&self) -> bool {
        self.key.is::<R>()
    }

    #[must_use]
    pub fn downcast_ref<R: Send + 'static>(&self) -> Option<&R> {
        self.value.downcast_ref::<R>()
    }

    #[must_use]
    pub fn downcast_mut<R: Send + 'static>(&mut self) -> Option<&mut R> {
        self.value.downcast_mut::<R>()
    }
}

impl fmt::Debug for ErasedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedResponse")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

pub(crate) fn box_command<C: Command>(command: C) -> ErasedCommand {
    ErasedCommand {
        shape: CommandShape::of::<C>(),
        value: Box::new(command),
    }
}

pub(crate) fn unbox_command<C: Command>(request: ErasedCommand) -> DispatchResult<C> {
    let found = request.shape.command.name();
    request
        .value
        .into_any()
        .downcast::<C>()
        .map(|command| *command)
        .map_err(|_| DispatchError::TypeMismatch {
            expected: type_name::<C>(),
            found,
        })
}

pub(crate) fn box_response<C: Command>(response: C::Response) -> ErasedResponse {
    ErasedResponse::new(response)
}

pub(crate) fn unbox_response<C: Command>(response: ErasedResponse) -> DispatchResult<C::Response> {
    let found = response.key.name();
    response
        .value
        .downcast::<C::Response>()
        .map(|value| *value)
        .map_err(|_| DispatchError::TypeMismatch {
            expected: type_name::<C::Response>(),
            found,
        })
}

/// A registered handler with its concrete trait-object type erased.
pub(crate) struct ErasedHandler {
    name: &'static str,
    inner: Box<dyn Any + Send + Sync>,
}

impl ErasedHandler {
    /// Erase `Arc<H>`, where `H` is e.g. `dyn CommandHandler<C>`.
    pub(crate) fn new<H>(name: &'static str, handler: Arc<H>) -> Self
    where
        H: ?Sized + Send + Sync + 'static,
    {
        Self {
            name,
            inner: Box::new(handler),
        }
    }

    /// Concrete handler type name, for logs.
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Recover the `Arc<H>` this entry was built from.
    pub(crate) fn typed<H>(&self) -> DispatchResult<Arc<H>>
    where
        H: ?Sized + Send + Sync + 'static,
    {
        self.inner
            .downcast_ref::<Arc<H>>()
            .cloned()
            .ok_or(DispatchError::TypeMismatch {
                expected: type_name::<Arc<H>>(),
                found: self.name,
            })
    }
}
