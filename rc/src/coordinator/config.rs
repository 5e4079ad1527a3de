//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Invalidation coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Minimum seconds between full (forced) refreshes for non-forced invalidations
    #[serde(rename = "debounce-secs", default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Top-sites cache size handed to the store at construction
    #[serde(rename = "cache-size", default = "default_cache_size")]
    pub cache_size: i32,

    /// Top-sites limit passed on every repopulate
    #[serde(rename = "topsites-limit", default = "default_topsites_limit")]
    pub topsites_limit: usize,
}

fn default_debounce_secs() -> u64 {
    debug!("default_debounce_secs: called");
    crate::DEFAULT_DEBOUNCE_SECS
}

fn default_cache_size() -> i32 {
    debug!("default_cache_size: called");
    crate::ACTIVITY_STREAM_CACHE_SIZE
}

fn default_topsites_limit() -> usize {
    debug!("default_topsites_limit: called");
    crate::TOPSITES_LIMIT
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            debounce_secs: crate::DEFAULT_DEBOUNCE_SECS,
            cache_size: crate::ACTIVITY_STREAM_CACHE_SIZE,
            topsites_limit: crate::TOPSITES_LIMIT,
        }
    }
}

impl CoordinatorConfig {
    /// Get the debounce interval as a Duration
    pub fn debounce_interval(&self) -> Duration {
        debug!(debounce_secs = %self.debounce_secs, "CoordinatorConfig::debounce_interval: called");
        Duration::from_secs(self.debounce_secs)
    }
}
