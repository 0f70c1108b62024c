//! # Behavior Pipeline
//!
//! Ordering, short-circuiting, open-behavior resolution and error
//! pass-through, exercised through `Dispatcher::send`.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use mediator_core::{
        Behavior, CancellationToken, Command, CommandHandler, CommandShape, DispatchError,
        DispatchResult, DispatcherBuilder, ErasedCommand, ErasedNext, ErasedResponse,
        LoggingBehavior, Next, OpenBehavior, DEFAULT_BEHAVIOR_ORDER,
    };

    use crate::fixtures::{
        CallLog, CannedSum, Echo, EchoHandler, FixedAccount, InsufficientFunds, OpenTrace,
        Passthrough, Sum, SumHandler, Trace, Withdraw,
    };

    fn sum_handler(log: &CallLog) -> SumHandler {
        SumHandler {
            log: Some(log.clone()),
        }
    }

    #[tokio::test]
    async fn test_behaviors_nest_in_registration_order() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(sum_handler(&log)).unwrap();
        builder
            .register_behavior::<Sum, _>(Trace { label: "A", log: log.clone() }, DEFAULT_BEHAVIOR_ORDER)
            .register_behavior::<Sum, _>(Trace { label: "B", log: log.clone() }, DEFAULT_BEHAVIOR_ORDER);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Sum { a: 2, b: 3 }, &cancel).await.unwrap(), 5);
        assert_eq!(log.entries(), vec!["A-enter", "B-enter", "H", "B-exit", "A-exit"]);
    }

    #[tokio::test]
    async fn test_order_value_overrides_registration_order() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(sum_handler(&log)).unwrap();
        builder
            .register_behavior::<Sum, _>(Trace { label: "inner", log: log.clone() }, 50)
            .register_behavior::<Sum, _>(Trace { label: "outer", log: log.clone() }, -50);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        dispatcher.send(Sum { a: 1, b: 1 }, &cancel).await.unwrap();
        assert_eq!(
            log.entries(),
            vec!["outer-enter", "inner-enter", "H", "inner-exit", "outer-exit"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(sum_handler(&log)).unwrap();
        builder.register_behavior::<Sum, _>(CannedSum(42), DEFAULT_BEHAVIOR_ORDER);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Sum { a: 2, b: 3 }, &cancel).await.unwrap(), 42);
        assert!(log.entries().is_empty(), "handler must not run");
    }

    #[tokio::test]
    async fn test_short_circuit_without_handler_still_answers() {
        let mut builder = DispatcherBuilder::new();
        builder.register_behavior::<Sum, _>(CannedSum(7), DEFAULT_BEHAVIOR_ORDER);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Sum { a: 0, b: 0 }, &cancel).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_open_behavior_wraps_every_command_shape() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(sum_handler(&log)).unwrap();
        builder.register_command::<Echo, _>(EchoHandler).unwrap();
        builder.register_open_behavior(OpenTrace { label: "open", log: log.clone() }, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        dispatcher.send(Sum { a: 1, b: 2 }, &cancel).await.unwrap();
        dispatcher.send(Echo(vec![9]), &cancel).await.unwrap();

        assert_eq!(
            log.entries(),
            vec!["open-enter:Sum", "H", "open-exit", "open-enter:Echo", "open-exit"]
        );
    }

    #[tokio::test]
    async fn test_closed_behavior_ignores_other_commands() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Echo, _>(EchoHandler).unwrap();
        builder.register_behavior::<Sum, _>(Trace { label: "sum-only", log: log.clone() }, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Echo(vec![1, 2]), &cancel).await.unwrap(), vec![1, 2]);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_open_and_closed_behaviors_interleave_by_order() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(sum_handler(&log)).unwrap();
        builder
            .register_behavior::<Sum, _>(Trace { label: "closed", log: log.clone() }, 10)
            .register_open_behavior(OpenTrace { label: "open", log: log.clone() }, 0)
            .register_open_behavior(LoggingBehavior, -10);
        let dispatcher = builder.build();

        assert_eq!(dispatcher.behavior_count(), 3);
        assert_eq!(dispatcher.behavior_names()[0], "LoggingBehavior");

        let cancel = CancellationToken::new();
        dispatcher.send(Sum { a: 4, b: 4 }, &cancel).await.unwrap();
        assert_eq!(
            log.entries(),
            vec!["open-enter:Sum", "closed-enter", "H", "closed-exit", "open-exit"]
        );
    }

    /// Retries the rest of the chain once after a failure.
    struct RetryOnce;

    #[async_trait]
    impl Behavior<Withdraw> for RetryOnce {
        async fn handle(
            &self,
            command: Withdraw,
            cancel: &CancellationToken,
            next: Next<'_, Withdraw>,
        ) -> DispatchResult<u64> {
            let amount = command.0;
            match next.run(command, cancel).await {
                Ok(balance) => Ok(balance),
                Err(_) => next.run(Withdraw(amount / 2), cancel).await,
            }
        }
    }

    #[tokio::test]
    async fn test_behavior_may_invoke_continuation_twice() {
        let mut builder = DispatcherBuilder::new();
        builder
            .register_command::<Withdraw, _>(FixedAccount { balance: 100 })
            .unwrap();
        builder.register_behavior::<Withdraw, _>(RetryOnce, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Withdraw(150), &cancel).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn test_errors_pass_through_behaviors_unmodified() {
        let mut builder = DispatcherBuilder::new();
        builder
            .register_command::<Withdraw, _>(FixedAccount { balance: 10 })
            .unwrap();
        builder
            .register_open_behavior(Passthrough, 0)
            .register_open_behavior(LoggingBehavior, 1);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        let err = dispatcher.send(Withdraw(11), &cancel).await.unwrap_err();
        assert_eq!(
            err.downcast_handler_ref::<InsufficientFunds>(),
            Some(&InsufficientFunds {
                wanted: 11,
                available: 10
            })
        );
    }

    #[tokio::test]
    async fn test_missing_handler_surfaces_through_behaviors() {
        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new();
        builder.register_open_behavior(OpenTrace { label: "open", log: log.clone() }, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        let err = dispatcher.send(Sum { a: 1, b: 1 }, &cancel).await.unwrap_err();
        assert!(err.is_no_handler());
        assert_eq!(log.entries(), vec!["open-enter:Sum", "open-exit"]);
    }

    /// Answers any command whose response is `i64` with `-1`.
    struct NegativeOne;

    #[async_trait]
    impl OpenBehavior for NegativeOne {
        async fn handle(
            &self,
            request: ErasedCommand,
            cancel: &CancellationToken,
            next: ErasedNext<'_>,
        ) -> DispatchResult<ErasedResponse> {
            if request.shape().response.is::<i64>() {
                return Ok(ErasedResponse::new(-1i64));
            }
            next.run(request, cancel).await
        }
    }

    #[tokio::test]
    async fn test_open_behavior_can_fabricate_typed_response() {
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(SumHandler::default()).unwrap();
        builder.register_command::<Echo, _>(EchoHandler).unwrap();
        builder.register_open_behavior(NegativeOne, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Sum { a: 5, b: 5 }, &cancel).await.unwrap(), -1);
        assert_eq!(dispatcher.send(Echo(vec![3]), &cancel).await.unwrap(), vec![3]);
    }

    /// Fabricates a response of the wrong type for every command.
    struct Liar;

    #[async_trait]
    impl OpenBehavior for Liar {
        async fn handle(
            &self,
            _request: ErasedCommand,
            _cancel: &CancellationToken,
            _next: ErasedNext<'_>,
        ) -> DispatchResult<ErasedResponse> {
            Ok(ErasedResponse::new("not a number"))
        }
    }

    #[tokio::test]
    async fn test_wrong_fabricated_type_is_reported_not_panicked() {
        let mut builder = DispatcherBuilder::new();
        builder.register_command::<Sum, _>(SumHandler::default()).unwrap();
        builder.register_open_behavior(Liar, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        let err = dispatcher.send(Sum { a: 1, b: 1 }, &cancel).await.unwrap_err();
        assert!(matches!(err, DispatchError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_resolver_runs_once_per_open_behavior_per_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = move |shape: &CommandShape, behavior: &Arc<dyn OpenBehavior>| -> Option<Arc<dyn OpenBehavior>> {
            counter.fetch_add(1, Ordering::SeqCst);
            // Only Sum gets the open behaviors.
            shape.command.is::<Sum>().then(|| behavior.clone())
        };

        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new().with_behavior_resolver(resolver);
        builder.register_command::<Sum, _>(sum_handler(&log)).unwrap();
        builder.register_command::<Echo, _>(EchoHandler).unwrap();
        builder
            .register_open_behavior(OpenTrace { label: "x", log: log.clone() }, 0)
            .register_open_behavior(OpenTrace { label: "y", log: log.clone() }, 1);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        dispatcher.send(Sum { a: 1, b: 1 }, &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        dispatcher.send(Echo(vec![]), &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        assert_eq!(
            log.entries(),
            vec!["x-enter:Sum", "y-enter:Sum", "H", "y-exit", "x-exit"]
        );
    }

    #[tokio::test]
    async fn test_retry_does_not_resolve_inner_open_behaviors_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = move |_shape: &CommandShape, behavior: &Arc<dyn OpenBehavior>| -> Option<Arc<dyn OpenBehavior>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(behavior.clone())
        };

        let log = CallLog::new();
        let mut builder = DispatcherBuilder::new().with_behavior_resolver(resolver);
        builder
            .register_command::<Withdraw, _>(FixedAccount { balance: 100 })
            .unwrap();
        builder
            .register_behavior::<Withdraw, _>(RetryOnce, 0)
            .register_open_behavior(OpenTrace { label: "inner", log: log.clone() }, 1);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Withdraw(150), &cancel).await.unwrap(), 25);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            log.entries(),
            vec!["inner-enter:Withdraw", "inner-exit", "inner-enter:Withdraw", "inner-exit"]
        );
    }

    #[derive(Clone)]
    struct Attempt;

    impl Command for Attempt {
        type Response = usize;
    }

    /// Fails the first `failures` attempts, then reports the attempt number.
    struct Flaky {
        failures: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl CommandHandler<Attempt> for Flaky {
        async fn handle(&self, _command: Attempt, _cancel: &CancellationToken) -> DispatchResult<usize> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return Err(DispatchError::msg("transient"));
            }
            Ok(attempt)
        }
    }

    /// Re-runs the rest of the pipeline for any command, up to `limit` times.
    struct RetryAny {
        limit: usize,
    }

    #[async_trait]
    impl OpenBehavior for RetryAny {
        async fn handle(
            &self,
            request: ErasedCommand,
            cancel: &CancellationToken,
            next: ErasedNext<'_>,
        ) -> DispatchResult<ErasedResponse> {
            let mut tries = 1;
            loop {
                match next.run(request.clone(), cancel).await {
                    Err(e) if tries < self.limit && !e.is_cancelled() => tries += 1,
                    outcome => return outcome,
                }
            }
        }
    }

    #[tokio::test]
    async fn test_open_behavior_retries_with_cloned_request() {
        let mut builder = DispatcherBuilder::new();
        builder
            .register_command::<Attempt, _>(Flaky {
                failures: 2,
                attempts: AtomicUsize::new(0),
            })
            .unwrap();
        builder.register_open_behavior(RetryAny { limit: 3 }, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        assert_eq!(dispatcher.send(Attempt, &cancel).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_open_retry_gives_up_with_last_error() {
        let mut builder = DispatcherBuilder::new();
        builder
            .register_command::<Attempt, _>(Flaky {
                failures: 5,
                attempts: AtomicUsize::new(0),
            })
            .unwrap();
        builder.register_open_behavior(RetryAny { limit: 2 }, 0);
        let dispatcher = builder.build();

        let cancel = CancellationToken::new();
        let err = dispatcher.send(Attempt, &cancel).await.unwrap_err();
        assert_eq!(err.to_string(), "transient");
    }
}
