//! # Behavior Pipeline
//!
//! Ordered interceptors wrapped around command execution.
//!
//! ## Composition
//!
//! Behaviors are sorted once, at build time, by `(order, registration
//! sequence)`, then folded into one chain per command type: that command's
//! closed behaviors plus every open one. Commands without closed behaviors
//! share the open-only chain. A dispatch walks its chain like a call stack:
//!
//! ```text
//! behavior[0] ─► behavior[1] ─► … ─► behavior[n-1] ─► terminal handler
//!      ▲               ▲                   ▲                 │
//!      └───────────────┴─────── returns ───┴─────────────────┘
//! ```
//!
//! Each behavior receives a [`Next`] (or [`ErasedNext`]) continuation: a
//! borrowed cursor over the remaining stages. Calling it zero times
//! short-circuits, calling it more than once retries.
//!
//! ## Closed and open behaviors
//!
//! - [`Behavior<C>`] is bound to one command type and only appears in that
//!   type's chain.
//! - [`OpenBehavior`] applies to every shape. It sees the command as an
//!   [`ErasedCommand`]. When a dispatch starts, the [`BehaviorResolver`]
//!   picks the instance to run for each open behavior (or skips it). Retries
//!   further out reuse those picks.

use std::any::type_name;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use mediator_types::{Command, CommandShape, DispatchResult, TypeKey};
use tokio_util::sync::CancellationToken;

use crate::bridge::{self, ErasedCommand, ErasedResponse};

/// Ordinal used when callers have no ordering preference.
pub const DEFAULT_BEHAVIOR_ORDER: i32 = 0;

/// Middleware bound to command `C`.
///
/// ```rust,ignore
/// struct RejectNegative;
///
/// #[async_trait]
/// impl Behavior<Sum> for RejectNegative {
///     async fn handle(&self, command: Sum, cancel: &CancellationToken, next: Next<'_, Sum>)
///         -> DispatchResult<i64>
///     {
///         if command.a < 0 {
///             return Ok(0); // short-circuit
///         }
///         next.run(command, cancel).await
///     }
/// }
/// ```
#[async_trait]
pub trait Behavior<C: Command>: Send + Sync + 'static {
    async fn handle(
        &self,
        command: C,
        cancel: &CancellationToken,
        next: Next<'_, C>,
    ) -> DispatchResult<C::Response>;
}

/// Middleware applied to every command shape.
///
/// The request arrives type-erased; use [`ErasedCommand::shape`] and
/// [`ErasedCommand::downcast_ref`] to inspect it. A short-circuiting open
/// behavior must build its [`ErasedResponse`] from the shape's response type.
#[async_trait]
pub trait OpenBehavior: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    async fn handle(
        &self,
        request: ErasedCommand,
        cancel: &CancellationToken,
        next: ErasedNext<'_>,
    ) -> DispatchResult<ErasedResponse>;
}

/// Picks the open-behavior instance to run for a concrete command shape.
///
/// Called exactly once per open behavior per dispatch. Returning `None`
/// skips the behavior for that dispatch.
pub trait BehaviorResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        shape: &CommandShape,
        behavior: &Arc<dyn OpenBehavior>,
    ) -> Option<Arc<dyn OpenBehavior>>;
}

/// Resolver that runs the registered instance for every shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedInstanceResolver;

impl BehaviorResolver for SharedInstanceResolver {
    fn resolve(
        &self,
        _shape: &CommandShape,
        behavior: &Arc<dyn OpenBehavior>,
    ) -> Option<Arc<dyn OpenBehavior>> {
        Some(behavior.clone())
    }
}

/// Any `Fn(&CommandShape, &Arc<dyn OpenBehavior>) -> Option<…>` is a resolver.
impl<F> BehaviorResolver for F
where
    F: Fn(&CommandShape, &Arc<dyn OpenBehavior>) -> Option<Arc<dyn OpenBehavior>>
        + Send
        + Sync
        + 'static,
{
    fn resolve(
        &self,
        shape: &CommandShape,
        behavior: &Arc<dyn OpenBehavior>,
    ) -> Option<Arc<dyn OpenBehavior>> {
        self(shape, behavior)
    }
}

/// End of the chain: resolves and runs the real handler.
pub(crate) trait Terminal: Send + Sync {
    fn invoke<'a>(
        &'a self,
        request: ErasedCommand,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<ErasedResponse>>;
}

/// A closed behavior with its command type erased.
trait ErasedBehavior: Send + Sync {
    fn invoke<'a>(
        &'a self,
        request: ErasedCommand,
        cancel: &'a CancellationToken,
        next: ErasedNext<'a>,
    ) -> BoxFuture<'a, DispatchResult<ErasedResponse>>;
}

struct ClosedBehavior<C: Command> {
    inner: Arc<dyn Behavior<C>>,
}

impl<C: Command> ErasedBehavior for ClosedBehavior<C> {
    fn invoke<'a>(
        &'a self,
        request: ErasedCommand,
        cancel: &'a CancellationToken,
        next: ErasedNext<'a>,
    ) -> BoxFuture<'a, DispatchResult<ErasedResponse>> {
        Box::pin(async move {
            let command = bridge::unbox_command::<C>(request)?;
            let response = self.inner.handle(command, cancel, Next::new(next)).await?;
            Ok(bridge::box_response::<C>(response))
        })
    }
}

enum Slot {
    Closed {
        target: TypeKey,
        behavior: Arc<dyn ErasedBehavior>,
    },
    Open(Arc<dyn OpenBehavior>),
}

impl Slot {
    fn applies_to(&self, key: &TypeKey) -> bool {
        match self {
            Slot::Closed { target, .. } => target == key,
            Slot::Open(_) => true,
        }
    }
}

/// One step of a command's chain.
enum Stage {
    Closed(Arc<dyn ErasedBehavior>),
    /// `ordinal` indexes the instances resolved for the current dispatch.
    Open {
        ordinal: usize,
        behavior: Arc<dyn OpenBehavior>,
    },
}

/// The behaviors that apply to one command type, in execution order.
#[derive(Default)]
struct Chain {
    stages: Vec<Stage>,
    open: usize,
}

impl Chain {
    fn from_slots<'s>(slots: impl Iterator<Item = &'s Slot>) -> Self {
        let mut chain = Chain::default();
        for slot in slots {
            let stage = match slot {
                Slot::Closed { behavior, .. } => Stage::Closed(behavior.clone()),
                Slot::Open(behavior) => {
                    chain.open += 1;
                    Stage::Open {
                        ordinal: chain.open - 1,
                        behavior: behavior.clone(),
                    }
                }
            };
            chain.stages.push(stage);
        }
        chain
    }

    /// One resolver call per open stage, in chain order.
    fn resolve(
        &self,
        shape: &CommandShape,
        resolver: &dyn BehaviorResolver,
    ) -> Vec<Option<Arc<dyn OpenBehavior>>> {
        let mut resolved = Vec::with_capacity(self.open);
        for stage in &self.stages {
            if let Stage::Open { behavior, .. } = stage {
                resolved.push(resolver.resolve(shape, behavior));
            }
        }
        resolved
    }
}

/// Continuation handed to an [`OpenBehavior`]: the rest of the pipeline.
///
/// `Copy`. Clone the [`ErasedCommand`] before the first `run` to run it
/// again.
#[derive(Clone, Copy)]
pub struct ErasedNext<'a> {
    stages: &'a [Stage],
    resolved: &'a [Option<Arc<dyn OpenBehavior>>],
    terminal: &'a dyn Terminal,
}

impl<'a> ErasedNext<'a> {
    /// Run the remaining behaviors and the terminal handler.
    pub async fn run(
        self,
        request: ErasedCommand,
        cancel: &CancellationToken,
    ) -> DispatchResult<ErasedResponse> {
        self.invoke(request, cancel).await
    }

    /// Behaviors left before the terminal handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }

    fn invoke<'b>(
        self,
        request: ErasedCommand,
        cancel: &'b CancellationToken,
    ) -> BoxFuture<'b, DispatchResult<ErasedResponse>>
    where
        'a: 'b,
    {
        Box::pin(async move {
            let Some((stage, rest)) = self.stages.split_first() else {
                return self.terminal.invoke(request, cancel).await;
            };
            let next = ErasedNext {
                stages: rest,
                ..self
            };

            match stage {
                Stage::Closed(behavior) => behavior.invoke(request, cancel, next).await,
                Stage::Open { ordinal, .. } => {
                    match self.resolved.get(*ordinal).and_then(Option::as_ref) {
                        Some(behavior) => behavior.handle(request, cancel, next).await,
                        None => next.invoke(request, cancel).await,
                    }
                }
            }
        })
    }
}

/// Typed continuation handed to a [`Behavior<C>`].
pub struct Next<'a, C> {
    inner: ErasedNext<'a>,
    _command: PhantomData<fn(C)>,
}

impl<C> Clone for Next<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Next<'_, C> {}

impl<'a, C: Command> Next<'a, C> {
    fn new(inner: ErasedNext<'a>) -> Self {
        Self {
            inner,
            _command: PhantomData,
        }
    }

    /// Run the remaining behaviors and the terminal handler.
    pub async fn run(self, command: C, cancel: &CancellationToken) -> DispatchResult<C::Response> {
        let response = self
            .inner
            .run(bridge::box_command(command), cancel)
            .await?;
        bridge::unbox_response::<C>(response)
    }

    /// Behaviors left before the terminal handler.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }
}

struct Registration {
    order: i32,
    name: &'static str,
    slot: Slot,
}

/// Collects behaviors during the build phase.
#[derive(Default)]
pub struct PipelineBuilder {
    registrations: Vec<Registration>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a behavior for command `C` at ordinal `order`.
    pub fn add_closed<C, B>(&mut self, behavior: B, order: i32)
    where
        C: Command,
        B: Behavior<C>,
    {
        self.registrations.push(Registration {
            order,
            name: type_name::<B>(),
            slot: Slot::Closed {
                target: TypeKey::of::<C>(),
                behavior: Arc::new(ClosedBehavior::<C> {
                    inner: Arc::new(behavior),
                }),
            },
        });
    }

    /// Add a behavior for every command shape at ordinal `order`.
    pub fn add_open<B: OpenBehavior>(&mut self, behavior: B, order: i32) {
        self.registrations.push(Registration {
            order,
            name: behavior.name(),
            slot: Slot::Open(Arc::new(behavior)),
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Sort by ordinal and fold into per-command chains. Equal ordinals keep
    /// registration order.
    #[must_use]
    pub fn build(mut self, resolver: Arc<dyn BehaviorResolver>) -> Pipeline {
        // Stable sort: ties stay in registration order.
        self.registrations.sort_by_key(|registration| registration.order);

        let names = self.registrations.iter().map(|r| r.name).collect();
        let slots: Vec<Slot> = self.registrations.into_iter().map(|r| r.slot).collect();

        let mut chains = HashMap::new();
        for slot in &slots {
            if let Slot::Closed { target, .. } = slot {
                chains.entry(*target).or_insert_with(|| {
                    Chain::from_slots(slots.iter().filter(|s| s.applies_to(target)))
                });
            }
        }
        let open_only = Chain::from_slots(slots.iter().filter(|s| matches!(s, Slot::Open(_))));

        Pipeline {
            chains,
            open_only,
            names,
            resolver,
        }
    }
}

/// The frozen, ordered behavior chains.
pub struct Pipeline {
    chains: HashMap<TypeKey, Chain>,
    open_only: Chain,
    names: Vec<&'static str>,
    resolver: Arc<dyn BehaviorResolver>,
}

impl Pipeline {
    /// A pipeline with no behaviors.
    #[must_use]
    pub fn empty() -> Self {
        PipelineBuilder::new().build(Arc::new(SharedInstanceResolver))
    }

    /// Registered behaviors, across all command types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Behavior names in execution order.
    #[must_use]
    pub fn behavior_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Behaviors a dispatch of command `key` passes through, before any
    /// resolver skips.
    #[must_use]
    pub fn chain_len(&self, key: &TypeKey) -> usize {
        self.chain(key).stages.len()
    }

    fn chain(&self, key: &TypeKey) -> &Chain {
        self.chains.get(key).unwrap_or(&self.open_only)
    }

    pub(crate) async fn execute(
        &self,
        request: ErasedCommand,
        cancel: &CancellationToken,
        terminal: &dyn Terminal,
    ) -> DispatchResult<ErasedResponse> {
        let chain = self.chain(&request.key());
        let resolved = chain.resolve(request.shape(), self.resolver.as_ref());
        let entry = ErasedNext {
            stages: &chain.stages,
            resolved: &resolved,
            terminal,
        };
        entry.run(request, cancel).await
    }
}
