//! Data store seam
//!
//! The store owns the expensive top-sites / highlights recomputation. The
//! coordinator only decides when to ask for it and with which force flag.

use async_trait::async_trait;

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{MemoryStore, RepopulateCall};

/// Backing store for the recommendations dataset
///
/// The store is shared: it outlives every coordinator bound to it.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// True once the owning profile has started shutting down
    ///
    /// Must be cheap; it is queried before every invalidation.
    fn is_shutting_down(&self) -> bool;

    /// Size the top-sites cache. Called once per coordinator at construction.
    fn set_cache_size(&self, size: i32);

    /// Recompute the cached dataset
    ///
    /// `force_refresh` asks the store to bypass its own freshness checks;
    /// `limit` caps the number of top sites produced.
    async fn repopulate(&self, force_refresh: bool, limit: usize) -> Result<(), StoreError>;
}
