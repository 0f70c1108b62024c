//! # Stream Router
//!
//! Resolves the handler of a stream request and wraps the sequence it
//! returns in a [`ResponseStream`].
//!
//! Routing failures surface when the stream is opened, not on the first
//! pull. Cancellation is observed between items: once the token fires the
//! next pull yields `Err(Cancelled)` and the stream then ends.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use mediator_types::{DispatchError, DispatchResult, StreamRequest, TypeKey};
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::registry::Registry;

/// Routes stream requests to their handler.
#[derive(Clone)]
pub struct StreamRouter {
    registry: Arc<Registry>,
}

impl StreamRouter {
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Open a fresh sequence for `request`.
    ///
    /// # Errors
    ///
    /// `NoHandler` if `S` has no registered handler.
    pub fn open<S: StreamRequest>(
        &self,
        request: S,
        cancel: &CancellationToken,
    ) -> DispatchResult<ResponseStream<S::Item>> {
        let handler = self.registry.resolve_stream::<S>()?;
        let inner = handler.handle(request, cancel.clone());
        Ok(ResponseStream::new(
            TypeKey::of::<S>().short_name(),
            inner,
            cancel.clone(),
        ))
    }
}

/// A lazy, cancellable sequence of stream items.
///
/// Implements `tokio_stream::Stream`; drive it with `StreamExt::next`.
pub struct ResponseStream<T> {
    request: &'static str,
    inner: BoxStream<'static, DispatchResult<T>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    finished: bool,
}

impl<T> ResponseStream<T> {
    fn new(
        request: &'static str,
        inner: BoxStream<'static, DispatchResult<T>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request,
            inner,
            cancelled: Box::pin(cancel.cancelled_owned()),
            finished: false,
        }
    }

    /// Short name of the request type this stream answers.
    #[must_use]
    pub fn request(&self) -> &'static str {
        self.request
    }

    /// True once the stream has ended, by exhaustion or cancellation.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<T> Stream for ResponseStream<T> {
    type Item = DispatchResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        // Checked before the inner stream so a fired token wins over a ready item.
        if self.cancelled.as_mut().poll(cx).is_ready() {
            self.finished = true;
            return Poll::Ready(Some(Err(DispatchError::Cancelled)));
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<T> fmt::Debug for ResponseStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("request", &self.request)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
