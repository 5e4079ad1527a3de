//! Invalidation coordinator for the recommendations cache
//!
//! The coordinator turns lifecycle notifications into store repopulates:
//! - **Debounce:** non-forced requests only force a refresh once the window has elapsed
//! - **Event mapping:** account, sync and clear-data events always force
//! - **Observer protocol:** `will_invalidate` before, `did_invalidate` after, once each
//! - **Lifecycle:** explicit, idempotent teardown; late completions are harmless

mod clock;
mod config;
mod core;
mod delegate;
mod error;
mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoordinatorConfig;
pub use self::core::{InvalidationCoordinator, InvalidationRequest, SUBSCRIBED_EVENTS, should_refresh};
pub use delegate::{DelegateSlot, ObserverDelegate};
pub use error::CoordinatorError;
pub use metrics::CoordinatorMetrics;
