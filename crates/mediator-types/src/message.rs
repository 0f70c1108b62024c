//! # Message Contracts
//!
//! The three message kinds routed by the mediator.
//!
//! | Kind | Handlers | Result |
//! |------|----------|--------|
//! | [`Command`] | exactly one | `Command::Response` |
//! | [`Notification`] | zero or more | completion |
//! | [`StreamRequest`] | exactly one | lazy sequence of `StreamRequest::Item` |
//!
//! Message values are created per call and carry no identity beyond one
//! dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// "Do X and give me a Y."
///
/// Commands are plain values. `Clone` lets a behavior run the rest of the
/// pipeline more than once with the same request.
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Sum { a: i64, b: i64 }
///
/// impl Command for Sum {
///     type Response = i64;
/// }
/// ```
pub trait Command: Clone + Send + Sync + 'static {
    /// The value the single handler produces.
    type Response: Send + 'static;
}

/// "X happened."
pub trait Notification: Send + Sync + 'static {}

/// "Give me a lazy sequence of Y."
pub trait StreamRequest: Send + Sync + 'static {
    /// Element type of the produced sequence.
    type Item: Send + 'static;
}

/// Which routing table a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Single-target request/response.
    Command,
    /// Fan-out to zero or more handlers.
    Notification,
    /// Single-target lazy sequence.
    Stream,
}

impl MessageKind {
    /// Lowercase label used in log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Notification => "notification",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
