//! In-process publish/subscribe for domain events.
//!
//! [`EventBus`] keeps a table of handlers keyed by [`EventKind`] and an
//! optional [`EventSink`] (the transport dispatcher). Publishing an event
//! first hands transport-bound kinds to the sink, then runs every handler
//! registered for that exact kind. A failing or panicking handler is logged
//! and skipped; nothing a subscriber does can reach the publisher.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::FutureExt;

use super::{DomainEvent, EventKind};
use crate::error::GatewayError;

/// A local consumer of domain events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Reacts to one event. Errors are logged by the bus and go no further.
    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// The transport-facing side of the bus.
///
/// Implemented by [`crate::dispatch::EventDispatcher`]; only invoked for
/// kinds where [`EventKind::is_transport_bound`] holds.
#[async_trait]
pub trait EventSink: Send + Sync + fmt::Debug {
    /// Fans the event out to its recipients.
    async fn dispatch(&self, event: &DomainEvent) -> Result<(), GatewayError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

type HandlerSlot = (u64, Arc<dyn EventHandler>);

struct HandlerTable {
    handlers: DashMap<EventKind, Vec<HandlerSlot>>,
    next_id: AtomicU64,
}

impl HandlerTable {
    fn insert(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    fn remove(&self, kind: EventKind, id: u64) {
        let _ = self.handlers.remove_if_mut(&kind, |_, slots| {
            slots.retain(|(slot_id, _)| *slot_id != id);
            slots.is_empty()
        });
    }

    fn snapshot(&self, kind: EventKind) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .get(&kind)
            .map(|slots| slots.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    fn count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, |slots| slots.len())
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in &self.handlers {
            map.entry(entry.key(), &entry.value().len());
        }
        map.finish()
    }
}

/// Handle to one registered handler.
///
/// Dropping it or calling [`Subscription::dispose`] removes exactly that
/// handler; other handlers for the same kind are unaffected. Use
/// [`Subscription::detach`] to keep the handler for the bus's lifetime.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    table: Option<Weak<HandlerTable>>,
    disposed: AtomicBool,
}

impl Subscription {
    /// Removes the handler. Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(table) = self.table.as_ref().and_then(Weak::upgrade) {
            table.remove(self.kind, self.id);
        }
    }

    /// Returns `true` once the handler has been removed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Event kind this subscription listens to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Leaves the handler registered permanently.
    pub fn detach(mut self) {
        self.table = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Summary of what a single [`EventBus::publish`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// The event was handed to the dispatcher.
    pub dispatched: bool,
    /// The dispatcher returned an error or panicked.
    pub dispatch_failed: bool,
    /// Handlers that completed successfully.
    pub handlers_run: usize,
    /// Handlers that returned an error or panicked.
    pub handlers_failed: usize,
}

/// Publish/subscribe hub for [`DomainEvent`]s.
///
/// Cheap to clone; clones share the handler table and sink.
#[derive(Clone)]
pub struct EventBus {
    table: Arc<HandlerTable>,
    sink: Option<Arc<dyn EventSink>>,
}

impl EventBus {
    /// Creates a bus with no transport sink; only local handlers run.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(HandlerTable {
                handlers: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
            sink: None,
        }
    }

    /// Creates a bus bridged to `sink` for transport-bound kinds.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Registers `handler` for events of exactly `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = self.table.insert(kind, handler);
        tracing::debug!(kind = kind.as_str(), id, "handler subscribed");
        Subscription {
            id,
            kind,
            table: Some(Arc::downgrade(&self.table)),
            disposed: AtomicBool::new(false),
        }
    }

    /// Registers a synchronous closure for events of exactly `kind`.
    pub fn subscribe_fn<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(FnHandler(handler)))
    }

    /// Publishes `event` to the dispatcher (if transport-bound) and to every
    /// handler registered for its kind.
    ///
    /// Handlers run against a snapshot of the table taken before the first
    /// one is called; subscriptions made mid-publish take effect on the next
    /// publish.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if the event fails validation.
    /// Dispatcher and handler failures are logged, never returned.
    pub async fn publish(&self, event: DomainEvent) -> Result<PublishReport, GatewayError> {
        event.validate()?;

        let kind = event.kind();
        let mut report = PublishReport::default();

        if kind.is_transport_bound()
            && let Some(sink) = &self.sink
        {
            report.dispatched = true;
            match AssertUnwindSafe(sink.dispatch(&event)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.dispatch_failed = true;
                    tracing::error!(kind = kind.as_str(), error = %e, "dispatch failed");
                }
                Err(panic) => {
                    report.dispatch_failed = true;
                    tracing::error!(
                        kind = kind.as_str(),
                        panic = %panic_message(&*panic),
                        "dispatcher panicked"
                    );
                }
            }
        }

        for handler in self.table.snapshot(kind) {
            match AssertUnwindSafe(handler.handle(&event)).catch_unwind().await {
                Ok(Ok(())) => report.handlers_run += 1,
                Ok(Err(e)) => {
                    report.handlers_failed += 1;
                    tracing::warn!(kind = kind.as_str(), error = %e, "event handler failed");
                }
                Err(panic) => {
                    report.handlers_failed += 1;
                    tracing::error!(
                        kind = kind.as_str(),
                        panic = %panic_message(&*panic),
                        "event handler panicked"
                    );
                }
            }
        }

        Ok(report)
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.table.count(kind)
    }

    /// Returns `true` if transport-bound events reach a dispatcher.
    #[must_use]
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.table)
            .field("sink", &self.sink)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
