//! # Command Router
//!
//! Runs a command through the [`Pipeline`] and, at its end, through the
//! single registered handler. Errors from behaviors and handlers are
//! returned exactly as raised.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use mediator_types::{Command, DispatchResult};
use tokio_util::sync::CancellationToken;

use crate::bridge::{self, ErasedCommand, ErasedResponse};
use crate::cancellation::run_cancellable;
use crate::pipeline::{Pipeline, Terminal};
use crate::registry::Registry;

/// Resolves the handler for `C` when the chain reaches its end.
struct HandlerTerminal<'r, C> {
    registry: &'r Registry,
    _command: PhantomData<fn(C)>,
}

impl<C: Command> Terminal for HandlerTerminal<'_, C> {
    fn invoke<'a>(
        &'a self,
        request: ErasedCommand,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, DispatchResult<ErasedResponse>> {
        Box::pin(async move {
            let handler = self.registry.resolve_command::<C>()?;
            let command = bridge::unbox_command::<C>(request)?;
            let response = run_cancellable(cancel, handler.handle(command, cancel)).await?;
            Ok(bridge::box_response::<C>(response))
        })
    }
}

/// Command routing plus the composed behavior chain.
#[derive(Clone)]
pub struct CommandRouter {
    registry: Arc<Registry>,
    pipeline: Arc<Pipeline>,
}

impl CommandRouter {
    #[must_use]
    pub fn new(registry: Arc<Registry>, pipeline: Arc<Pipeline>) -> Self {
        Self { registry, pipeline }
    }

    /// Execute `command` through every behavior and its handler.
    ///
    /// # Errors
    ///
    /// - `NoHandler` when the chain reaches its end and `C` has no handler
    /// - `Cancelled` when `cancel` fires while the handler is running
    /// - whatever a behavior or the handler returned, unmodified
    pub async fn execute<C: Command>(
        &self,
        command: C,
        cancel: &CancellationToken,
    ) -> DispatchResult<C::Response> {
        let terminal = HandlerTerminal::<C> {
            registry: self.registry.as_ref(),
            _command: PhantomData,
        };
        let response = self
            .pipeline
            .execute(bridge::box_command(command), cancel, &terminal)
            .await?;
        bridge::unbox_response::<C>(response)
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
