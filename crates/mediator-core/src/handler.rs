//! # Handlers
//!
//! One trait per message kind. Handlers are stored behind `Arc<dyn …>` once
//! registered, so any handler-local mutable state needs its own
//! synchronisation.

use async_trait::async_trait;
use futures::stream::BoxStream;
use mediator_types::{Command, DispatchResult, Notification, StreamRequest};
use tokio_util::sync::CancellationToken;

/// The single handler of command `C`.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    /// Handle the command and produce its response.
    ///
    /// The dispatcher races this future against `cancel`, so long-running
    /// work is dropped at its next suspension point once the token fires.
    async fn handle(&self, command: C, cancel: &CancellationToken) -> DispatchResult<C::Response>;
}

/// One of zero or more handlers of notification `N`.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync + 'static {
    /// React to the notification.
    ///
    /// Every handler registered for `N` sees the same value.
    async fn handle(&self, notification: &N, cancel: &CancellationToken) -> DispatchResult<()>;
}

/// The single handler of stream request `S`.
pub trait StreamHandler<S: StreamRequest>: Send + Sync + 'static {
    /// Open a fresh, lazy sequence for `request`.
    ///
    /// Nothing should be produced until the returned stream is polled. The
    /// dispatcher wraps the stream so cancellation is observed between
    /// items; handlers only need `cancel` for work inside a single item.
    fn handle(
        &self,
        request: S,
        cancel: CancellationToken,
    ) -> BoxStream<'static, DispatchResult<S::Item>>;
}
