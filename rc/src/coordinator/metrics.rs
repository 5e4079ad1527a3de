//! Coordinator counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a coordinator's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    /// Notifications handed to `on_event`
    #[serde(rename = "events-received")]
    pub events_received: u64,
    /// Notifications of a kind the coordinator does not handle
    #[serde(rename = "ignored-events")]
    pub ignored_events: u64,
    /// `invalidate` calls that reached the store
    pub requested: u64,
    /// `invalidate` calls dropped because the store was shutting down
    #[serde(rename = "skipped-shutdown")]
    pub skipped_shutdown: u64,
    /// Repopulates issued with `force_refresh = true`
    #[serde(rename = "forced-refreshes")]
    pub forced_refreshes: u64,
    /// Repopulates issued with `force_refresh = false`
    #[serde(rename = "soft-refreshes")]
    pub soft_refreshes: u64,
    pub completed: u64,
    pub failed: u64,
    #[serde(rename = "in-flight")]
    pub in_flight: u64,
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    events_received: AtomicU64,
    ignored_events: AtomicU64,
    requested: AtomicU64,
    skipped_shutdown: AtomicU64,
    forced_refreshes: AtomicU64,
    soft_refreshes: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn event_received(&self) {
        self.events_received.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn event_ignored(&self) {
        self.ignored_events.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn skipped_shutdown(&self) {
        self.skipped_shutdown.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn requested(&self, force_refresh: bool) {
        self.requested.fetch_add(1, Ordering::SeqCst);
        if force_refresh {
            self.forced_refreshes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.soft_refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn finished(&self, success: bool) {
        if success {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn snapshot(&self, in_flight: usize) -> CoordinatorMetrics {
        CoordinatorMetrics {
            events_received: self.events_received.load(Ordering::SeqCst),
            ignored_events: self.ignored_events.load(Ordering::SeqCst),
            requested: self.requested.load(Ordering::SeqCst),
            skipped_shutdown: self.skipped_shutdown.load(Ordering::SeqCst),
            forced_refreshes: self.forced_refreshes.load(Ordering::SeqCst),
            soft_refreshes: self.soft_refreshes.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            in_flight: in_flight as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let recorder = MetricsRecorder::default();
        recorder.event_received();
        recorder.event_received();
        recorder.event_ignored();
        recorder.requested(true);
        recorder.requested(false);
        recorder.finished(true);
        recorder.finished(false);
        recorder.skipped_shutdown();

        let snap = recorder.snapshot(3);
        assert_eq!(snap.events_received, 2);
        assert_eq!(snap.ignored_events, 1);
        assert_eq!(snap.requested, 2);
        assert_eq!(snap.forced_refreshes, 1);
        assert_eq!(snap.soft_refreshes, 1);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.skipped_shutdown, 1);
        assert_eq!(snap.in_flight, 3);
    }
}
