//! # End-to-End Scenario
//!
//! One dispatcher serving a command, a notification and a stream, assembled
//! through a handler inventory the way an application composition root
//! would.

use mediator_core::{DispatchResult, DispatcherBuilder, HandlerInventory};

use crate::fixtures::{Announce, CallLog, CountUp, CountUpHandler, Sum, SumHandler, UserCreated};

/// Registrations for the user-facing feature set.
pub struct AccountInventory {
    pub log: CallLog,
}

impl HandlerInventory for AccountInventory {
    fn register(&self, builder: &mut DispatcherBuilder) -> DispatchResult<()> {
        builder.register_command::<Sum, _>(SumHandler::default())?;
        builder
            .register_notification::<UserCreated, _>(Announce::new("welcome", &self.log))
            .register_notification::<UserCreated, _>(Announce::new("audit", &self.log));
        builder.register_stream::<CountUp, _>(CountUpHandler::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mediator_core::{CancellationToken, Dispatcher, LoggingBehavior, RegistryStats};

    fn dispatcher(log: &CallLog) -> Dispatcher {
        let mut builder = DispatcherBuilder::new();
        builder
            .register_inventory(&AccountInventory { log: log.clone() })
            .expect("inventory registers cleanly");
        builder.register_open_behavior(LoggingBehavior, 0);
        builder.build()
    }

    #[tokio::test]
    async fn test_sum_user_created_count_up() {
        let log = CallLog::new();
        let dispatcher = dispatcher(&log);
        let cancel = CancellationToken::new();

        assert_eq!(dispatcher.send(Sum { a: 2, b: 3 }, &cancel).await.unwrap(), 5);

        dispatcher
            .publish(
                UserCreated {
                    name: "Ada".to_string(),
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(log.entries(), vec!["welcome:Ada", "audit:Ada"]);

        let counted: Vec<i64> = dispatcher
            .stream(CountUp { from: 10, count: 3 }, &cancel)
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(counted, vec![10, 11, 12]);
    }

    #[test]
    fn test_inventory_applied_twice_conflicts() {
        let inventory = AccountInventory { log: CallLog::new() };
        let mut builder = DispatcherBuilder::new();
        builder.register_inventory(&inventory).unwrap();
        assert!(builder.register_inventory(&inventory).unwrap_err().is_conflict());
    }

    #[test]
    fn test_stats_and_debug_output() {
        let dispatcher = dispatcher(&CallLog::new());
        assert_eq!(
            dispatcher.stats(),
            RegistryStats {
                commands: 1,
                notification_types: 1,
                notification_handlers: 2,
                streams: 1,
            }
        );

        let debug = format!("{dispatcher:?}");
        assert!(debug.contains("LoggingBehavior"));
    }

    #[tokio::test]
    async fn test_clones_share_registrations() {
        let log = CallLog::new();
        let original = dispatcher(&log);
        let clone = original.clone();
        drop(original);

        let cancel = CancellationToken::new();
        assert_eq!(clone.send(Sum { a: 20, b: 22 }, &cancel).await.unwrap(), 42);
        assert_eq!(clone.notification_handler_count::<UserCreated>(), 2);
    }
}
