//! # Handler Registry
//!
//! Three lookup tables keyed by [`TypeKey`]:
//!
//! | Table | Per key | Duplicate registration |
//! |-------|---------|------------------------|
//! | commands | exactly one handler | `Conflict` |
//! | notifications | ordered list | appended |
//! | streams | exactly one handler | `Conflict` |
//!
//! [`RegistryBuilder`] is mutated during the build phase only. `freeze()`
//! turns it into a [`Registry`], which has no mutating methods and is shared
//! behind an `Arc` without locks.

use std::collections::HashMap;
use std::sync::Arc;

use mediator_types::{
    Command, DispatchError, DispatchResult, MessageKind, Notification, StreamRequest, TypeKey,
};
use tracing::{debug, warn};

use crate::bridge::ErasedHandler;
use crate::handler::{CommandHandler, NotificationHandler, StreamHandler};

/// Table sizes, logged at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Command types with a handler.
    pub commands: usize,
    /// Notification types with at least one handler.
    pub notification_types: usize,
    /// Notification handlers across all types.
    pub notification_handlers: usize,
    /// Stream request types with a handler.
    pub streams: usize,
}

/// Mutable registry used during the build phase.
#[derive(Default)]
pub struct RegistryBuilder {
    commands: HashMap<TypeKey, ErasedHandler>,
    notifications: HashMap<TypeKey, Vec<ErasedHandler>>,
    streams: HashMap<TypeKey, ErasedHandler>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for command `C`.
    ///
    /// # Errors
    ///
    /// `Conflict` if `C` already has a handler. The existing handler is kept.
    pub fn register_command<C, H>(&mut self, handler: H) -> DispatchResult<()>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        Self::insert_unique(
            &mut self.commands,
            MessageKind::Command,
            TypeKey::of::<C>(),
            ErasedHandler::new(std::any::type_name::<H>(), handler),
        )
    }

    /// Append a handler for notification `N`.
    pub fn register_notification<N, H>(&mut self, handler: H)
    where
        N: Notification,
        H: NotificationHandler<N>,
    {
        let key = TypeKey::of::<N>();
        let handler: Arc<dyn NotificationHandler<N>> = Arc::new(handler);
        let handlers = self.notifications.entry(key).or_default();
        handlers.push(ErasedHandler::new(std::any::type_name::<H>(), handler));

        debug!(
            request = key.short_name(),
            handler = std::any::type_name::<H>(),
            position = handlers.len() - 1,
            "Registered notification handler"
        );
    }

    /// Register the handler for stream request `S`.
    ///
    /// # Errors
    ///
    /// `Conflict` if `S` already has a handler. The existing handler is kept.
    pub fn register_stream<S, H>(&mut self, handler: H) -> DispatchResult<()>
    where
        S: StreamRequest,
        H: StreamHandler<S>,
    {
        let handler: Arc<dyn StreamHandler<S>> = Arc::new(handler);
        Self::insert_unique(
            &mut self.streams,
            MessageKind::Stream,
            TypeKey::of::<S>(),
            ErasedHandler::new(std::any::type_name::<H>(), handler),
        )
    }

    fn insert_unique(
        table: &mut HashMap<TypeKey, ErasedHandler>,
        kind: MessageKind,
        key: TypeKey,
        entry: ErasedHandler,
    ) -> DispatchResult<()> {
        if let Some(existing) = table.get(&key) {
            warn!(
                kind = %kind,
                request = key.short_name(),
                existing = existing.name(),
                rejected = entry.name(),
                "Duplicate handler registration rejected"
            );
            return Err(DispatchError::Conflict {
                kind,
                request: key.name(),
            });
        }

        debug!(
            kind = %kind,
            request = key.short_name(),
            handler = entry.name(),
            "Registered handler"
        );
        table.insert(key, entry);
        Ok(())
    }

    /// Table sizes registered so far.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        table_stats(&self.commands, &self.notifications, &self.streams)
    }

    /// Freeze into the read-only [`Registry`].
    #[must_use]
    pub fn freeze(self) -> Registry {
        Registry {
            commands: self.commands,
            notifications: self.notifications,
            streams: self.streams,
        }
    }
}

/// Read-only handler tables.
pub struct Registry {
    commands: HashMap<TypeKey, ErasedHandler>,
    notifications: HashMap<TypeKey, Vec<ErasedHandler>>,
    streams: HashMap<TypeKey, ErasedHandler>,
}

impl Registry {
    /// Handler for command `C`.
    ///
    /// # Errors
    ///
    /// `NoHandler` if none is registered.
    pub fn resolve_command<C: Command>(&self) -> DispatchResult<Arc<dyn CommandHandler<C>>> {
        let key = TypeKey::of::<C>();
        self.commands
            .get(&key)
            .ok_or(DispatchError::NoHandler {
                kind: MessageKind::Command,
                request: key.name(),
            })?
            .typed::<dyn CommandHandler<C>>()
    }

    /// Handlers for notification `N`, in registration order. Possibly empty.
    pub fn resolve_notifications<N: Notification>(
        &self,
    ) -> impl Iterator<Item = DispatchResult<Arc<dyn NotificationHandler<N>>>> + Send + '_ {
        self.notifications
            .get(&TypeKey::of::<N>())
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(ErasedHandler::typed::<dyn NotificationHandler<N>>)
    }

    /// Handler for stream request `S`.
    ///
    /// # Errors
    ///
    /// `NoHandler` if none is registered.
    pub fn resolve_stream<S: StreamRequest>(&self) -> DispatchResult<Arc<dyn StreamHandler<S>>> {
        let key = TypeKey::of::<S>();
        self.streams
            .get(&key)
            .ok_or(DispatchError::NoHandler {
                kind: MessageKind::Stream,
                request: key.name(),
            })?
            .typed::<dyn StreamHandler<S>>()
    }

    #[must_use]
    pub fn has_command(&self, key: &TypeKey) -> bool {
        self.commands.contains_key(key)
    }

    #[must_use]
    pub fn has_stream(&self, key: &TypeKey) -> bool {
        self.streams.contains_key(key)
    }

    #[must_use]
    pub fn notification_count(&self, key: &TypeKey) -> usize {
        self.notifications.get(key).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        table_stats(&self.commands, &self.notifications, &self.streams)
    }
}

fn table_stats(
    commands: &HashMap<TypeKey, ErasedHandler>,
    notifications: &HashMap<TypeKey, Vec<ErasedHandler>>,
    streams: &HashMap<TypeKey, ErasedHandler>,
) -> RegistryStats {
    RegistryStats {
        commands: commands.len(),
        notification_types: notifications.len(),
        notification_handlers: notifications.values().map(Vec::len).sum(),
        streams: streams.len(),
    }
}
