// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Named event handler registry.
//!
//! Events are registered by name, handlers are attached to registered names
//! and fired in registration order. Every handler receives a clone of the
//! caller's context and the event payload, and is awaited inline so handlers
//! for one event never overlap.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by an event handler.
pub type HandlerFuture<Err> = Pin<Box<dyn Future<Output = Result<(), Err>> + Send>>;

/// Async event handler callback.
pub type EventHandler<Ctx, Ev, Err> = Arc<dyn Fn(Ctx, Ev) -> HandlerFuture<Err> + Send + Sync>;

pub struct EventHandlers<Ctx, Ev, Err> {
    owner: String,
    handlers: HashMap<&'static str, Vec<EventHandler<Ctx, Ev, Err>>>,
}

impl<Ctx, Ev, Err> EventHandlers<Ctx, Ev, Err>
where
    Ctx: Clone,
    Ev: Clone,
{
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            handlers: HashMap::new(),
        }
    }

    /// Register an event name. Registering twice is a logged no-op.
    pub fn register_event(&mut self, event_name: &'static str) {
        if self.handlers.contains_key(event_name) {
            tracing::warn!("{}: event {} already registered", self.owner, event_name);
            return;
        }
        self.handlers.insert(event_name, Vec::new());
    }

    /// Attach a handler. Handlers for unregistered events are dropped with a
    /// warning.
    pub fn add_event_handler(&mut self, event_name: &'static str, handler: EventHandler<Ctx, Ev, Err>) {
        match self.handlers.get_mut(event_name) {
            Some(list) => list.push(handler),
            None => tracing::warn!("{}: event {} not registered", self.owner, event_name),
        }
    }

    pub fn is_registered(&self, event_name: &str) -> bool {
        self.handlers.contains_key(event_name)
    }

    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.get(event_name).map_or(0, Vec::len)
    }

    /// Await every handler for `event_name` in order. Stops at the first
    /// error. Unregistered events are ignored.
    pub async fn call_event_handler(&self, event_name: &str, ctx: &Ctx, event: &Ev) -> Result<(), Err> {
        let Some(list) = self.handlers.get(event_name) else {
            tracing::trace!("{}: no handlers for {}", self.owner, event_name);
            return Ok(());
        };
        for handler in list {
            handler(ctx.clone(), event.clone()).await?;
        }
        Ok(())
    }
}

impl<Ctx, Ev, Err> fmt::Debug for EventHandlers<Ctx, Ev, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&&str> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("EventHandlers")
            .field("owner", &self.owner)
            .field("events", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Registry = EventHandlers<Arc<AtomicUsize>, u32, String>;

    fn counting(add: usize) -> EventHandler<Arc<AtomicUsize>, u32, String> {
        Arc::new(move |counter: Arc<AtomicUsize>, _ev: u32| -> HandlerFuture<String> {
            Box::pin(async move {
                counter.fetch_add(add, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn handlers_run_in_order() {
        let mut registry = Registry::new("test");
        registry.register_event("on_joined");
        registry.add_event_handler("on_joined", counting(1));
        registry.add_event_handler("on_joined", counting(10));
        assert_eq!(registry.handler_count("on_joined"), 2);

        let counter = Arc::new(AtomicUsize::new(0));
        registry.call_event_handler("on_joined", &counter, &0).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn unregistered_events_are_ignored() {
        let mut registry = Registry::new("test");
        registry.add_event_handler("on_missing", counting(1));
        assert!(!registry.is_registered("on_missing"));

        let counter = Arc::new(AtomicUsize::new(0));
        registry.call_event_handler("on_missing", &counter, &0).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_error_stops_dispatch() {
        let mut registry = Registry::new("test");
        registry.register_event("on_left");
        registry.add_event_handler(
            "on_left",
            Arc::new(|_c: Arc<AtomicUsize>, ev: u32| -> HandlerFuture<String> {
                Box::pin(async move { Err(format!("failed {ev}")) })
            }),
        );
        registry.add_event_handler("on_left", counting(1));

        let counter = Arc::new(AtomicUsize::new(0));
        let err = registry.call_event_handler("on_left", &counter, &7).await.unwrap_err();
        assert_eq!(err, "failed 7");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
