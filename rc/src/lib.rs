//! recocache - invalidation coordinator for the top-sites recommendations cache
//!
//! The recommendations dataset (top sites, highlights) is expensive to
//! recompute. recocache listens for profile lifecycle notifications and
//! decides when to ask the store to repopulate it, bracketing each request
//! with observer callbacks.
//!
//! # Core Concepts
//!
//! - **Debounce Window**: non-forced invalidations only force a refresh after 15 minutes
//! - **Always Issue**: every invalidation reaches the store; debounce only sets the force flag
//! - **Paired Callbacks**: one `will_invalidate` before, one `did_invalidate` after completion
//! - **Explicit Teardown**: unsubscription never depends on drop timing
//!
//! # Modules
//!
//! - [`events`] - Lifecycle event kinds and the event bus
//! - [`store`] - Data store trait and the in-memory simulator
//! - [`coordinator`] - Debounce policy, event mapping, observer protocol
//! - [`registry`] - Composition root holding the named coordinators
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod registry;
pub mod store;

/// Top-sites cache size handed to the store
pub const ACTIVITY_STREAM_CACHE_SIZE: i32 = 16;

/// Top-sites limit passed on every repopulate
pub const TOPSITES_LIMIT: usize = 16;

/// Default debounce window (15 minutes)
pub const DEFAULT_DEBOUNCE_SECS: u64 = 15 * 60;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{
    Clock, CoordinatorConfig, CoordinatorError, CoordinatorMetrics, InvalidationCoordinator, InvalidationRequest,
    ManualClock, ObserverDelegate, SUBSCRIBED_EVENTS, SystemClock,
};
pub use events::{EventBus, EventKind, EventSource, Notification, Subscription, create_event_bus};
pub use registry::{ACTIVITY_STREAM, CoordinatorRegistry};
pub use store::{DataStore, MemoryStore, RepopulateCall, StoreError};
