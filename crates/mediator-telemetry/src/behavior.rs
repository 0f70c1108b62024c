//! Open pipeline behavior that records command metrics.

use std::time::Instant;

use async_trait::async_trait;
use mediator_core::{CancellationToken, ErasedCommand, ErasedNext, ErasedResponse, OpenBehavior};
use mediator_types::{DispatchResult, MessageKind};

use crate::metrics::{COMMANDS_TOTAL, COMMAND_DURATION, ERRORS_TOTAL};

/// Counts and times every command that passes through it.
///
/// Register it outermost (lowest order) to include the cost of the other
/// behaviors in the measured duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsBehavior;

#[async_trait]
impl OpenBehavior for MetricsBehavior {
    fn name(&self) -> &'static str {
        "MetricsBehavior"
    }

    async fn handle(
        &self,
        request: ErasedCommand,
        cancel: &CancellationToken,
        next: ErasedNext<'_>,
    ) -> DispatchResult<ErasedResponse> {
        let request_name = request.shape().command.short_name();
        let started = Instant::now();

        let outcome = next.run(request, cancel).await;

        crate::metric_observe!(
            COMMAND_DURATION,
            &[request_name],
            started.elapsed().as_secs_f64()
        );
        match &outcome {
            Ok(_) => crate::metric_inc!(COMMANDS_TOTAL, &[request_name, "ok"]),
            Err(e) => {
                crate::metric_inc!(COMMANDS_TOTAL, &[request_name, e.label()]);
                crate::metric_inc!(ERRORS_TOTAL, &[MessageKind::Command.as_str(), e.label()]);
            }
        }

        outcome
    }
}
