//! # Error Types
//!
//! The dispatcher is a transparent conduit for handler errors: a handler's
//! error reaches the caller as [`DispatchError::Handler`], whose `Display`
//! and `source()` are the original error's own.

use thiserror::Error;

use crate::message::MessageKind;

/// Result alias used by handlers, behaviors and the dispatcher.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors surfaced by the mediator.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// `send` or `stream` targeted a message type with no registered handler.
    #[error("No {kind} handler registered for {request}")]
    NoHandler {
        kind: MessageKind,
        request: &'static str,
    },

    /// A command or stream type was registered twice during the build phase.
    #[error("Conflicting {kind} handler registration for {request}")]
    Conflict {
        kind: MessageKind,
        request: &'static str,
    },

    /// The caller's cancellation token fired.
    #[error("Dispatch cancelled")]
    Cancelled,

    /// A value crossing the type-erasure bridge was not the expected type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// One or more notification handlers failed under `ContinueOnError`.
    #[error("{} notification handler(s) failed; first: {}", .0.len(), first_message(.0))]
    Aggregate(Vec<DispatchError>),

    /// Opaque error raised by a handler or behavior.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

fn first_message(errors: &[DispatchError]) -> String {
    errors
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

impl DispatchError {
    /// Wrap any error raised by handler code.
    pub fn handler<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Handler(error.into())
    }

    /// Handler error built from a message.
    pub fn msg<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        Self::Handler(anyhow::Error::msg(message))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    #[must_use]
    pub fn is_no_handler(&self) -> bool {
        matches!(self, Self::NoHandler { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Borrow the concrete handler error, if this is one of type `E`.
    #[must_use]
    pub fn downcast_handler_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Handler(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Stable label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoHandler { .. } => "no_handler",
            Self::Conflict { .. } => "conflict",
            Self::Cancelled => "cancelled",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::Aggregate(_) => "aggregate",
            Self::Handler(_) => "handler",
        }
    }
}
