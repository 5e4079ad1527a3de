//! Lifecycle event delivery
//!
//! Profile-level notifications (account changes, sync completion, data
//! clearing) are emitted on an [`EventBus`]. Consumers register for a fixed
//! set of [`EventKind`]s through the [`EventSource`] trait and get a private
//! channel carrying only those kinds.
//!
//! ```text
//!   Account / Sync / Clear-data
//!            │ emit(kind)
//!            ▼
//!   ┌──────────────────────┐      tap() ──► spawn_event_logger
//!   │       EVENT BUS      │
//!   └──────────────────────┘
//!            │ filtered by kind
//!            ▼
//!   InvalidationCoordinator pump ──► on_event(kind)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use recocache::events::{EventBus, EventKind, EventSource};
//!
//! let bus = EventBus::with_default_capacity();
//! let mut sub = bus.subscribe(&[EventKind::SyncFinished]);
//! bus.emit(EventKind::SyncFinished);
//! let notification = sub.rx.recv().await;
//! bus.unsubscribe(sub.id);
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventSource, Subscription, SubscriptionId, create_event_bus};
pub use logger::spawn_event_logger;
pub use types::{EventKind, Notification};
