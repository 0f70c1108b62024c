//! # Mediator Types
//!
//! Message contracts, request-shape identifiers and the error taxonomy
//! shared by the mediator crates.
//!
//! ## Design Principles
//!
//! - **Type-safe at the call site**: a command's response type is fixed by
//!   its [`Command`] impl, so `send` needs no casts from the caller.
//! - **One key per type**: the registry is keyed by [`TypeKey`], derived from
//!   `TypeId`, never from hand-written strings.
//! - **Errors pass through**: handler failures surface as
//!   [`DispatchError::Handler`] with the original error intact.

pub mod errors;
pub mod message;
pub mod type_key;

pub use errors::{DispatchError, DispatchResult};
pub use message::{Command, MessageKind, Notification, StreamRequest};
pub use type_key::{CommandShape, TypeKey};
