//! # Mediator Core - In-Process Dispatcher
//!
//! Routes three kinds of messages without a hand-written dispatch table:
//!
//! - **Commands**: one handler, one response, wrapped by the behavior pipeline
//! - **Notifications**: zero or more handlers, run in registration order
//! - **Stream requests**: one handler producing a lazy, cancellable sequence
//!
//! ## Flow
//!
//! ```text
//!                      ┌─────────────────────────────────────────────┐
//!  send(cmd) ────────► │ behavior[0] ─► … ─► behavior[n] ─► handler  │
//!                      └─────────────────────────────────────────────┘
//!  publish(note) ────► handler[0] ─► handler[1] ─► …      (no pipeline)
//!  stream(req) ──────► handler ─► ResponseStream           (no pipeline)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut builder = Dispatcher::builder();
//! builder.register_command::<Sum, _>(Adder)?;
//! builder.register_open_behavior(LoggingBehavior, DEFAULT_BEHAVIOR_ORDER);
//! let dispatcher = builder.build();
//!
//! let cancel = CancellationToken::new();
//! let five = dispatcher.send(Sum { a: 2, b: 3 }, &cancel).await?;
//! ```
//!
//! Registration happens once; the built [`Dispatcher`] is immutable and can
//! be cloned into as many tasks as needed.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod behaviors;
pub mod bridge;
pub mod cancellation;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod inventory;
pub mod notification;
pub mod pipeline;
pub mod registry;
pub mod stream;

// Re-export main types
pub use behaviors::LoggingBehavior;
pub use bridge::{ErasedCommand, ErasedResponse};
pub use command::CommandRouter;
pub use config::{ConfigError, DispatcherConfig, PublishStrategy};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use handler::{CommandHandler, NotificationHandler, StreamHandler};
pub use inventory::HandlerInventory;
pub use notification::NotificationHub;
pub use pipeline::{
    Behavior, BehaviorResolver, ErasedNext, Next, OpenBehavior, Pipeline, PipelineBuilder,
    SharedInstanceResolver, DEFAULT_BEHAVIOR_ORDER,
};
pub use registry::{Registry, RegistryBuilder, RegistryStats};
pub use stream::{ResponseStream, StreamRouter};

pub use mediator_types::{
    Command, CommandShape, DispatchError, DispatchResult, MessageKind, Notification,
    StreamRequest, TypeKey,
};
pub use tokio_util::sync::CancellationToken;
