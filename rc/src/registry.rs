//! CoordinatorRegistry - composition root for per-profile coordinators

use std::sync::Arc;

use tracing::debug;

use crate::coordinator::{Clock, CoordinatorConfig, CoordinatorError, InvalidationCoordinator, SystemClock};
use crate::events::EventSource;
use crate::store::DataStore;

/// Name of the activity-stream (top sites + highlights) coordinator
pub const ACTIVITY_STREAM: &str = "activity-stream";

/// Holds the named coordinators for one profile
///
/// Currently a single coordinator, bound to the store given at construction.
pub struct CoordinatorRegistry {
    activity_stream: InvalidationCoordinator,
}

impl CoordinatorRegistry {
    pub fn new(
        store: Arc<dyn DataStore>,
        source: Arc<dyn EventSource>,
        config: &CoordinatorConfig,
    ) -> Result<Self, CoordinatorError> {
        Self::with_clock(store, source, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn DataStore>,
        source: Arc<dyn EventSource>,
        config: &CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoordinatorError> {
        debug!("CoordinatorRegistry::with_clock: called");
        let activity_stream = InvalidationCoordinator::with_clock(ACTIVITY_STREAM, store, source, config, clock)?;
        Ok(Self { activity_stream })
    }

    pub fn activity_stream(&self) -> &InvalidationCoordinator {
        &self.activity_stream
    }

    /// Look up a coordinator by name
    pub fn get(&self, name: &str) -> Option<&InvalidationCoordinator> {
        match name {
            ACTIVITY_STREAM => Some(&self.activity_stream),
            _ => None,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        vec![self.activity_stream.name()]
    }

    /// Tear down every coordinator
    pub fn teardown(&self) {
        debug!("CoordinatorRegistry::teardown: called");
        self.activity_stream.teardown();
    }
}
