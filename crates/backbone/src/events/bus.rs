//! Kind-keyed synchronous event bus.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use strum::IntoEnumIterator;
use tracing::{debug, error, trace};

use crate::utils::catch_panic;

use super::handlers::{Callback, Handlers, OwnerId, Subscriber};
use super::types::{Event, EventKind};

/// A registered callback together with the owner that registered it.
#[derive(Clone)]
struct Subscription {
    owner: OwnerId,
    name: &'static str,
    callback: Callback,
}

type SubscriberList = RwLock<Vec<Subscription>>;

/// Outcome of a single [`EventBus::post`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostReport {
    /// Subscribers whose callback returned `Ok`.
    pub delivered: usize,
    /// Subscribers whose callback returned an error or panicked.
    pub failed: usize,
}

/// Kind-keyed event bus.
///
/// Subscribers register typed callbacks per [`EventKind`]; [`post`] invokes
/// every callback of the event's kind on the calling thread, in registration
/// order.
///
/// Every kind has its own lock, created up front, so registering for one kind
/// never blocks delivery of another. Delivery works on a snapshot of the list,
/// so callbacks may register or unregister (themselves included) while an
/// event is being delivered; such changes take effect from the next post.
///
/// Cloning the bus is cheap and yields a handle to the same subscriber lists.
///
/// [`post`]: EventBus::post
pub struct EventBus {
    subscribers: Arc<HashMap<EventKind, SubscriberList>>,
}

impl EventBus {
    /// Creates a bus with an empty subscriber list for every kind.
    pub fn new() -> Self {
        let subscribers = EventKind::iter()
            .map(|kind| (kind, RwLock::new(Vec::new())))
            .collect();

        Self {
            subscribers: Arc::new(subscribers),
        }
    }

    /// Registers `owner`'s callbacks.
    ///
    /// A callback whose `(owner, kind, name)` is already registered is skipped,
    /// so registering the same owner twice never duplicates deliveries.
    ///
    /// Returns the number of newly added subscriptions.
    pub fn register(&self, owner: OwnerId, handlers: Handlers) -> usize {
        let mut added = 0;

        for entry in handlers.entries {
            let mut list = self.write(entry.kind);
            let duplicate = list
                .iter()
                .any(|sub| sub.owner == owner && sub.name == entry.name);

            if duplicate {
                debug!(
                    target: "backbone::events",
                    %owner,
                    handler = entry.name,
                    kind = %entry.kind,
                    "Handler already registered, skipping"
                );
                continue;
            }

            list.push(Subscription {
                owner,
                name: entry.name,
                callback: entry.callback,
            });
            added += 1;
        }

        debug!(target: "backbone::events", %owner, added, "Registered handlers");
        added
    }

    /// Registers a [`Subscriber`] under its own owner id.
    pub fn register_subscriber<S: Subscriber>(&self, subscriber: Arc<S>) -> OwnerId {
        let owner = subscriber.owner_id();
        self.register(owner, subscriber.handlers());
        owner
    }

    /// Removes every subscription belonging to `owner`.
    ///
    /// Unknown or absent (`None`) owners are a no-op. Returns the number of
    /// subscriptions removed.
    pub fn unregister(&self, owner: impl Into<Option<OwnerId>>) -> usize {
        let Some(owner) = owner.into() else {
            return 0;
        };

        let mut removed = 0;
        for kind in EventKind::iter() {
            let mut list = self.write(kind);
            let before = list.len();
            list.retain(|sub| sub.owner != owner);
            removed += before - list.len();
        }

        if removed == 0 {
            debug!(target: "backbone::events", %owner, "Unregister for unknown owner");
        } else {
            debug!(target: "backbone::events", %owner, removed, "Unregistered handlers");
        }
        removed
    }

    /// Delivers `event` to every subscriber of its kind.
    ///
    /// Runs synchronously on the calling thread. A callback that fails or
    /// panics is logged with its owner, handler name and event kind; the
    /// remaining subscribers still receive the event. Posting a kind with no
    /// subscribers is a no-op.
    pub fn post(&self, event: impl Into<Event>) -> PostReport {
        let event = event.into();
        let kind = event.kind();

        let snapshot: Vec<Subscription> = self.read(kind).clone();
        if snapshot.is_empty() {
            trace!(target: "backbone::events", %kind, "No subscribers for event");
            return PostReport::default();
        }

        let mut report = PostReport::default();
        for sub in &snapshot {
            let outcome = catch_panic(|| (sub.callback)(&event));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    error!(
                        target: "backbone::events",
                        owner = %sub.owner,
                        handler = sub.name,
                        %kind,
                        error = %err,
                        "Subscriber failed, continuing delivery"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        target: "backbone::events",
                        owner = %sub.owner,
                        handler = sub.name,
                        %kind,
                        panic = %panic,
                        "Subscriber panicked, continuing delivery"
                    );
                }
            }
        }

        report
    }

    /// Number of callbacks currently registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.read(kind).len()
    }

    /// Returns true if `owner` has at least one subscription.
    pub fn is_registered(&self, owner: OwnerId) -> bool {
        EventKind::iter().any(|kind| self.read(kind).iter().any(|sub| sub.owner == owner))
    }

    // Lists are only mutated by `push`/`retain` while holding the lock and
    // callbacks never run under it, so a poisoned lock still guards a valid
    // list.
    fn read(&self, kind: EventKind) -> RwLockReadGuard<'_, Vec<Subscription>> {
        self.list(kind)
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, kind: EventKind) -> RwLockWriteGuard<'_, Vec<Subscription>> {
        self.list(kind)
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn list(&self, kind: EventKind) -> &SubscriberList {
        // Every kind is inserted in `new`.
        &self.subscribers[&kind]
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for kind in EventKind::iter() {
            map.entry(&kind, &self.subscriber_count(kind));
        }
        map.finish()
    }
}
