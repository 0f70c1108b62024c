//! # Built-in Behaviors
//!
//! [`LoggingBehavior`] wraps every command in a `dispatch` span with a fresh
//! `dispatch_id`, so handler logs can be correlated per call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mediator_types::DispatchResult;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::bridge::{ErasedCommand, ErasedResponse};
use crate::pipeline::{ErasedNext, OpenBehavior};

/// Open behavior that logs entry, completion and failure of every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBehavior;

#[async_trait]
impl OpenBehavior for LoggingBehavior {
    fn name(&self) -> &'static str {
        "LoggingBehavior"
    }

    async fn handle(
        &self,
        request: ErasedCommand,
        cancel: &CancellationToken,
        next: ErasedNext<'_>,
    ) -> DispatchResult<ErasedResponse> {
        let shape = *request.shape();
        let span = info_span!(
            "dispatch",
            request = shape.command.short_name(),
            response = shape.response.short_name(),
            dispatch_id = %Uuid::new_v4(),
        );

        async move {
            let started = Instant::now();
            debug!(remaining = next.remaining(), "Dispatching command");

            match next.run(request, cancel).await {
                Ok(response) => {
                    debug!(elapsed_us = micros(started.elapsed()), "Command completed");
                    Ok(response)
                }
                Err(e) => {
                    warn!(
                        elapsed_us = micros(started.elapsed()),
                        kind = e.label(),
                        error = %e,
                        "Command failed"
                    );
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Whole microseconds, saturating at `u64::MAX`.
fn micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}
