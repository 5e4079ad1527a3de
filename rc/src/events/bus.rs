//! Event Bus - kind-filtered pub/sub for lifecycle notifications
//!
//! Subscribers register for a fixed set of [`EventKind`]s and receive only
//! those, in emission order, on their own unbounded channel. A broadcast tap
//! sees every notification regardless of kind (for logging consumers).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use super::types::{EventKind, Notification};

/// Default tap channel capacity (notifications)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Identifies one registration on an [`EventSource`]
pub type SubscriptionId = Uuid;

/// Source of lifecycle notifications
///
/// Coordinators depend on this trait rather than on a process-global
/// notification centre, so tests and embedders can inject their own.
pub trait EventSource: Send + Sync {
    /// Register for the given kinds; notifications arrive on the returned receiver
    fn subscribe(&self, kinds: &[EventKind]) -> Subscription;

    /// Remove a registration. Returns false if the ID was unknown.
    ///
    /// Dropping the registration closes the subscriber's receiver.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// A live registration returned by [`EventSource::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub rx: mpsc::UnboundedReceiver<Notification>,
}

struct Subscriber {
    kinds: HashSet<EventKind>,
    tx: mpsc::UnboundedSender<Notification>,
}

/// In-process event bus
pub struct EventBus {
    tap: broadcast::Sender<Notification>,
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    channel_capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given tap capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tap, _) = broadcast::channel(capacity.max(1));
        Self {
            tap,
            subscribers: RwLock::new(HashMap::new()),
            channel_capacity: capacity,
        }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit a notification of the given kind
    ///
    /// Fire-and-forget: returns the number of subscribers it was delivered to.
    /// Subscribers whose receiver has been dropped are pruned.
    pub fn emit(&self, kind: EventKind) -> usize {
        let notification = Notification::new(kind);
        debug!(kind = %notification.kind, id = %notification.id, "EventBus::emit");

        // No tap listeners is OK
        let _ = self.tap.send(notification.clone());

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            for (id, subscriber) in subscribers.iter() {
                if !subscriber.kinds.contains(&notification.kind) {
                    continue;
                }
                if subscriber.tx.send(notification.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            debug!(count = dead.len(), "EventBus::emit: pruning closed subscribers");
            let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
            for id in dead {
                subscribers.remove(&id);
            }
        }

        delivered
    }

    /// Receive every notification emitted after this call, regardless of kind
    pub fn tap(&self) -> broadcast::Receiver<Notification> {
        debug!("EventBus::tap: new tap listener");
        self.tap.subscribe()
    }

    /// Capacity of the tap channel
    pub fn capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Get the number of active kind-filtered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Get the number of subscribers registered for a kind
    pub fn subscribers_for(&self, kind: &EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.kinds.contains(kind))
            .count()
    }

    /// Get the kinds a registration covers, if it is still live
    pub fn kinds_for(&self, id: SubscriptionId) -> Option<HashSet<EventKind>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|s| s.kinds.clone())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let id = Uuid::now_v7();
        debug!(%id, ?kinds, "EventBus::subscribe: new subscriber");
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = Subscriber {
            kinds: kinds.iter().cloned().collect(),
            tx,
        };
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, subscriber);
        Subscription { id, rx }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some();
        debug!(%id, removed, "EventBus::unsubscribe");
        removed
    }
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::with_default_capacity())
}
