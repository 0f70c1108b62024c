//! # Dispatcher Facade
//!
//! The single entry point callers use:
//!
//! | Call | Route | Pipeline |
//! |------|-------|----------|
//! | [`Dispatcher::send`] | [`CommandRouter`] | yes |
//! | [`Dispatcher::publish`] | [`NotificationHub`] | no |
//! | [`Dispatcher::stream`] | [`StreamRouter`] | no |
//!
//! ## Lifecycle
//!
//! 1. Create a [`DispatcherBuilder`] and register handlers and behaviors.
//!    Duplicate command or stream handlers fail here with `Conflict`.
//! 2. `build()` freezes everything into a [`Dispatcher`].
//! 3. Clone the dispatcher freely; clones share the same frozen tables.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use mediator_types::{
    Command, DispatchResult, MessageKind, Notification, StreamRequest, TypeKey,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cancellation::ensure_active;
use crate::command::CommandRouter;
use crate::config::DispatcherConfig;
use crate::handler::{CommandHandler, NotificationHandler, StreamHandler};
use crate::inventory::HandlerInventory;
use crate::notification::NotificationHub;
use crate::pipeline::{
    Behavior, BehaviorResolver, OpenBehavior, PipelineBuilder, SharedInstanceResolver,
};
use crate::registry::{Registry, RegistryBuilder, RegistryStats};
use crate::stream::{ResponseStream, StreamRouter};

/// Collects registrations, then builds an immutable [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    registry: RegistryBuilder,
    pipeline: PipelineBuilder,
    resolver: Option<Arc<dyn BehaviorResolver>>,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`SharedInstanceResolver`] for open behaviors.
    #[must_use]
    pub fn with_behavior_resolver<R: BehaviorResolver>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Register the single handler of command `C`.
    ///
    /// # Errors
    ///
    /// `Conflict` if `C` already has one.
    pub fn register_command<C, H>(&mut self, handler: H) -> DispatchResult<&mut Self>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        self.registry.register_command::<C, H>(handler)?;
        Ok(self)
    }

    /// Append a handler of notification `N`. Handlers run in the order
    /// they were registered.
    pub fn register_notification<N, H>(&mut self, handler: H) -> &mut Self
    where
        N: Notification,
        H: NotificationHandler<N>,
    {
        self.registry.register_notification::<N, H>(handler);
        self
    }

    /// Register the single handler of stream request `S`.
    ///
    /// # Errors
    ///
    /// `Conflict` if `S` already has one.
    pub fn register_stream<S, H>(&mut self, handler: H) -> DispatchResult<&mut Self>
    where
        S: StreamRequest,
        H: StreamHandler<S>,
    {
        self.registry.register_stream::<S, H>(handler)?;
        Ok(self)
    }

    /// Add a behavior for command `C`. Lower `order` runs further out;
    /// equal orders keep registration order.
    pub fn register_behavior<C, B>(&mut self, behavior: B, order: i32) -> &mut Self
    where
        C: Command,
        B: Behavior<C>,
    {
        debug!(
            behavior = type_name::<B>(),
            request = TypeKey::of::<C>().short_name(),
            order,
            "Registered behavior"
        );
        self.pipeline.add_closed::<C, B>(behavior, order);
        self
    }

    /// Add a behavior that wraps every command.
    pub fn register_open_behavior<B: OpenBehavior>(&mut self, behavior: B, order: i32) -> &mut Self {
        debug!(behavior = behavior.name(), order, "Registered open behavior");
        self.pipeline.add_open(behavior, order);
        self
    }

    /// Apply a bundle of registrations.
    ///
    /// # Errors
    ///
    /// Whatever the inventory returns, typically `Conflict`.
    pub fn register_inventory<I>(&mut self, inventory: &I) -> DispatchResult<&mut Self>
    where
        I: HandlerInventory + ?Sized,
    {
        inventory.register(self)?;
        Ok(self)
    }

    /// Freeze the registrations. The result can no longer change.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        let registry = Arc::new(self.registry.freeze());
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(SharedInstanceResolver));
        let pipeline = Arc::new(self.pipeline.build(resolver));

        let stats = registry.stats();
        info!(
            commands = stats.commands,
            notification_types = stats.notification_types,
            notification_handlers = stats.notification_handlers,
            streams = stats.streams,
            behaviors = pipeline.len(),
            publish_strategy = %self.config.publish_strategy,
            "Dispatcher built"
        );

        Dispatcher {
            commands: CommandRouter::new(registry.clone(), pipeline),
            notifications: NotificationHub::new(registry.clone(), self.config.publish_strategy),
            streams: StreamRouter::new(registry.clone()),
            registry,
            config: Arc::new(self.config),
        }
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("stats", &self.registry.stats())
            .field("behaviors", &self.pipeline.len())
            .field("custom_resolver", &self.resolver.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Routes commands, notifications and stream requests to their handlers.
///
/// Cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    commands: CommandRouter,
    notifications: NotificationHub,
    streams: StreamRouter,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Send `command` through the behavior pipeline to its handler.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` has fired or fires mid-flight
    /// - `NoHandler` if `C` has no handler
    /// - any behavior or handler error, unmodified
    pub async fn send<C: Command>(
        &self,
        command: C,
        cancel: &CancellationToken,
    ) -> DispatchResult<C::Response> {
        ensure_active(cancel)?;
        let outcome = self.commands.execute(command, cancel).await;
        self.trace_outcome(MessageKind::Command, TypeKey::of::<C>(), &outcome);
        outcome
    }

    /// Deliver `notification` to each of its handlers in registration order.
    ///
    /// # Errors
    ///
    /// See [`NotificationHub::publish`].
    pub async fn publish<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> DispatchResult<()> {
        let outcome = self.notifications.publish(&notification, cancel).await;
        self.trace_outcome(MessageKind::Notification, TypeKey::of::<N>(), &outcome);
        outcome
    }

    /// Open a lazy sequence for `request`.
    ///
    /// If `cancel` has already fired, the first pull yields `Err(Cancelled)`.
    ///
    /// # Errors
    ///
    /// `NoHandler` if `S` has no handler, before any item is pulled.
    pub fn stream<S: StreamRequest>(
        &self,
        request: S,
        cancel: &CancellationToken,
    ) -> DispatchResult<ResponseStream<S::Item>> {
        let outcome = self.streams.open(request, cancel);
        self.trace_outcome(MessageKind::Stream, TypeKey::of::<S>(), &outcome);
        outcome
    }

    #[must_use]
    pub fn has_command_handler<C: Command>(&self) -> bool {
        self.registry.has_command(&TypeKey::of::<C>())
    }

    #[must_use]
    pub fn notification_handler_count<N: Notification>(&self) -> usize {
        self.registry.notification_count(&TypeKey::of::<N>())
    }

    #[must_use]
    pub fn has_stream_handler<S: StreamRequest>(&self) -> bool {
        self.registry.has_stream(&TypeKey::of::<S>())
    }

    #[must_use]
    pub fn behavior_count(&self) -> usize {
        self.commands.pipeline().len()
    }

    /// Behavior names in execution order, outermost first.
    #[must_use]
    pub fn behavior_names(&self) -> &[&'static str] {
        self.commands.pipeline().behavior_names()
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    fn trace_outcome<T>(&self, kind: MessageKind, key: TypeKey, outcome: &DispatchResult<T>) {
        if !self.config.log_dispatch {
            return;
        }
        match outcome {
            Ok(_) => debug!(kind = %kind, request = key.short_name(), outcome = "ok", "Dispatched"),
            Err(e) => debug!(
                kind = %kind,
                request = key.short_name(),
                outcome = e.label(),
                "Dispatched"
            ),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("stats", &self.stats())
            .field("behaviors", &self.behavior_names())
            .field("config", &self.config)
            .finish()
    }
}
