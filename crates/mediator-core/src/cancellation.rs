//! # Cancellation
//!
//! One caller-supplied [`CancellationToken`] is threaded through a whole
//! `send`, `publish` or `stream` call. The dispatcher never creates timeouts
//! of its own.

use std::future::Future;

use mediator_types::{DispatchError, DispatchResult};
use tokio_util::sync::CancellationToken;

/// Drive `work` until it completes or `cancel` fires.
///
/// The token is checked first on every poll, so a token that is already
/// cancelled yields [`DispatchError::Cancelled`] without polling `work` at
/// all. A cancelled `work` future is dropped.
pub async fn run_cancellable<F, T>(cancel: &CancellationToken, work: F) -> DispatchResult<T>
where
    F: Future<Output = DispatchResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DispatchError::Cancelled),
        outcome = work => outcome,
    }
}

/// Fail fast with [`DispatchError::Cancelled`] if `cancel` has fired.
pub fn ensure_active(cancel: &CancellationToken) -> DispatchResult<()> {
    if cancel.is_cancelled() {
        Err(DispatchError::Cancelled)
    } else {
        Ok(())
    }
}
