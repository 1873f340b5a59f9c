//! Typed subscriber callbacks and owner identities.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::{Event, EventKind, EventPayload};

/// Result returned by every subscriber callback.
pub type HandlerResult = Result<(), HandlerError>;

pub(crate) type Callback = Arc<dyn Fn(&Event) -> HandlerResult + Send + Sync>;

/// Failure reported by a subscriber callback.
///
/// The bus logs it and moves on to the next subscriber.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Identity of the object that owns a group of subscriptions.
///
/// Only used to remove all of an owner's subscriptions at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocates a process-unique owner id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// One typed callback waiting to be registered.
pub(crate) struct HandlerEntry {
    pub kind: EventKind,
    pub name: &'static str,
    pub callback: Callback,
}

/// The set of callbacks an owner registers with an [`EventBus`](super::EventBus).
///
/// Each callback is bound to one payload type and therefore to exactly one
/// [`EventKind`]:
///
/// ```ignore
/// let handlers = Handlers::new()
///     .on::<PacketReceived>("count_packets", move |packet| {
///         counter.fetch_add(1, Ordering::Relaxed);
///         Ok(())
///     })
///     .on::<NetworkFailure>("log_failure", |failure| {
///         tracing::warn!("{}", failure.message);
///         Ok(())
///     });
/// bus.register(owner, handlers);
/// ```
///
/// The `name` identifies the handler within its owner; registering the same
/// `(owner, kind, name)` twice is deduplicated by the bus.
#[derive(Default)]
pub struct Handlers {
    pub(crate) entries: Vec<HandlerEntry>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback for events carrying payload `E`.
    pub fn on<E: EventPayload>(
        mut self,
        name: &'static str,
        handler: impl Fn(&E) -> HandlerResult + Send + Sync + 'static,
    ) -> Self {
        let callback: Callback = Arc::new(move |event: &Event| match E::from_event(event) {
            Some(payload) => handler(payload),
            None => Err(HandlerError::new(format!(
                "handler for {} received {} event",
                E::KIND,
                event.kind()
            ))),
        });

        self.entries.push(HandlerEntry {
            kind: E::KIND,
            name,
            callback,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kinds this handler set subscribes to, in insertion order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.entries.iter().map(|entry| entry.kind)
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| (entry.kind, entry.name)))
            .finish()
    }
}

/// An object that declares its own event handlers.
///
/// Implementors are registered with
/// [`EventBus::register_subscriber`](super::EventBus::register_subscriber) and
/// removed in bulk through their [`OwnerId`].
pub trait Subscriber: Send + Sync + 'static {
    fn owner_id(&self) -> OwnerId;

    /// Builds the callbacks for this subscriber. Callbacks typically capture
    /// a clone of the `Arc` to reach the subscriber's state.
    fn handlers(self: Arc<Self>) -> Handlers;
}
