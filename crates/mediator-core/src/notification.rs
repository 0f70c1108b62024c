//! # Notification Hub
//!
//! Fans one notification out to every handler registered for its type.
//!
//! ## Ordering
//!
//! Handlers run strictly one after another, in registration order; each
//! completes before the next starts. There is no concurrent fan-out.
//!
//! ## Failures
//!
//! | Strategy | On handler error |
//! |----------|------------------|
//! | `StopOnFirstError` | return it unmodified, skip the rest |
//! | `ContinueOnError` | keep going, then return `Aggregate` with every failure |
//!
//! Cancellation always stops the fan-out, whatever the strategy.
//! Notifications never pass through the behavior pipeline.

use std::sync::Arc;

use mediator_types::{DispatchError, DispatchResult, Notification, TypeKey};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cancellation::{ensure_active, run_cancellable};
use crate::config::PublishStrategy;
use crate::registry::Registry;

/// Sequential notification fan-out.
#[derive(Clone)]
pub struct NotificationHub {
    registry: Arc<Registry>,
    strategy: PublishStrategy,
}

impl NotificationHub {
    #[must_use]
    pub fn new(registry: Arc<Registry>, strategy: PublishStrategy) -> Self {
        Self { registry, strategy }
    }

    #[must_use]
    pub fn strategy(&self) -> PublishStrategy {
        self.strategy
    }

    /// Deliver `notification` to its handlers.
    ///
    /// Completes immediately when no handler is registered.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` fires before or during a handler
    /// - the first handler error (`StopOnFirstError`)
    /// - `Aggregate` of all handler errors (`ContinueOnError`)
    pub async fn publish<N: Notification>(
        &self,
        notification: &N,
        cancel: &CancellationToken,
    ) -> DispatchResult<()> {
        ensure_active(cancel)?;

        let mut failures = Vec::new();
        for (position, handler) in self.registry.resolve_notifications::<N>().enumerate() {
            let handler = handler?;
            match run_cancellable(cancel, handler.handle(notification, cancel)).await {
                Ok(()) => {}
                Err(DispatchError::Cancelled) => return Err(DispatchError::Cancelled),
                Err(error) => match self.strategy {
                    PublishStrategy::StopOnFirstError => return Err(error),
                    PublishStrategy::ContinueOnError => {
                        debug!(
                            request = TypeKey::of::<N>().short_name(),
                            position,
                            "Notification handler failed, continuing fan-out"
                        );
                        failures.push(error);
                    }
                },
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Aggregate(failures))
        }
    }
}
