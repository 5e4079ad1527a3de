//! InvalidationCoordinator - debounce-gated repopulate with observer callbacks
//!
//! Every `invalidate` issues exactly one store repopulate and, around it,
//! exactly one `will_invalidate` / `did_invalidate` pair. The debounce window
//! only decides whether that repopulate is forced.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::CoordinatorConfig;
use super::delegate::{DelegateSlot, ObserverDelegate};
use super::error::CoordinatorError;
use super::metrics::{CoordinatorMetrics, MetricsRecorder};
use crate::events::{EventKind, EventSource, SubscriptionId};
use crate::store::DataStore;

/// The event kinds every coordinator subscribes to, no more and no less
pub const SUBSCRIBED_EVENTS: [EventKind; 3] = [
    EventKind::AccountChanged,
    EventKind::SyncFinished,
    EventKind::PrivateDataCleared,
];

/// An invalidation derived from a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub force_invalidate: bool,
}

impl InvalidationRequest {
    /// Map an event kind to the invalidation it triggers, if any
    pub fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::AccountChanged | EventKind::SyncFinished | EventKind::PrivateDataCleared => {
                Some(Self { force_invalidate: true })
            }
            EventKind::Other(_) => None,
        }
    }
}

/// Decide whether an invalidation bypasses the store's freshness checks
///
/// Forced requests always do; others only once strictly more than
/// `debounce` has elapsed since the last accepted invalidation.
pub fn should_refresh(force_invalidate: bool, now: DateTime<Utc>, last: DateTime<Utc>, debounce: Duration) -> bool {
    if force_invalidate {
        return true;
    }
    let window = TimeDelta::from_std(debounce).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(last) > window
}

/// Nanoseconds since the epoch, saturating outside the representable range
fn to_nanos(t: DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt()
        .unwrap_or(if t.timestamp() < 0 { i64::MIN } else { i64::MAX })
}

struct Inner {
    name: String,
    store: Arc<dyn DataStore>,
    delegate: DelegateSlot,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    limit: usize,
    /// Nanos since epoch of the last accepted invalidation
    last_invalidation_ns: AtomicI64,
    in_flight: watch::Sender<usize>,
    metrics: MetricsRecorder,
    runtime: Handle,
    /// Cleared by teardown; the pump holds it while dispatching an event
    accepting_events: Mutex<bool>,
}

/// Decrements the in-flight count when the completion task ends, however it ends
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Inner {
    fn invalidate(self: &Arc<Self>, force_invalidate: bool) -> Option<JoinHandle<()>> {
        debug!(coordinator = %self.name, force_invalidate, "InvalidationCoordinator::invalidate: called");

        if self.store.is_shutting_down() {
            debug!(coordinator = %self.name, "InvalidationCoordinator::invalidate: store shutting down, skipping");
            self.metrics.skipped_shutdown();
            return None;
        }

        let now = self.clock.now();
        let last = self.last_invalidation();
        let force_refresh = should_refresh(force_invalidate, now, last, self.debounce);
        debug!(
            coordinator = %self.name,
            force_refresh,
            %last,
            "InvalidationCoordinator::invalidate: debounce decision"
        );

        if let Some(delegate) = self.delegate.get() {
            delegate.will_invalidate();
        }

        // Racing calls may both proceed; only debounce precision suffers
        if force_refresh {
            self.last_invalidation_ns.store(to_nanos(now), Ordering::Release);
        }

        self.metrics.requested(force_refresh);
        self.in_flight.send_modify(|n| *n += 1);
        let guard = InFlightGuard { inner: Arc::clone(self) };

        let inner = Arc::clone(self);
        let limit = self.limit;
        Some(self.runtime.spawn(async move {
            let _guard = guard;
            let outcome = AssertUnwindSafe(inner.store.repopulate(force_refresh, limit))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {
                    debug!(coordinator = %inner.name, force_refresh, "InvalidationCoordinator: repopulate completed");
                    inner.metrics.finished(true);
                }
                Ok(Err(e)) => {
                    warn!(coordinator = %inner.name, error = %e, "InvalidationCoordinator: repopulate failed");
                    inner.metrics.finished(false);
                }
                Err(_) => {
                    warn!(coordinator = %inner.name, "InvalidationCoordinator: repopulate panicked");
                    inner.metrics.finished(false);
                }
            }

            // Re-read the slot: the delegate may have been cleared or dropped meanwhile
            if let Some(delegate) = inner.delegate.get() {
                delegate.did_invalidate();
            }
        }))
    }

    fn on_event(self: &Arc<Self>, kind: &EventKind) -> Option<JoinHandle<()>> {
        debug!(coordinator = %self.name, %kind, "InvalidationCoordinator::on_event: called");
        let handle = match InvalidationRequest::from_event(kind) {
            Some(request) => self.invalidate(request.force_invalidate),
            None => {
                warn!(coordinator = %self.name, %kind, "Received unexpected notification");
                self.metrics.event_ignored();
                None
            }
        };

        // Counted after dispatch, when any repopulate is already in flight
        self.metrics.event_received();
        handle
    }

    fn last_invalidation(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.last_invalidation_ns.load(Ordering::Acquire))
    }

    /// Dispatch one notification from the subscription. Returns false once torn down.
    fn pump_event(self: &Arc<Self>, kind: &EventKind) -> bool {
        let accepting = self.accepting_events.lock().unwrap_or_else(PoisonError::into_inner);
        if !*accepting {
            debug!(coordinator = %self.name, %kind, "InvalidationCoordinator: torn down, dropping notification");
            return false;
        }
        let _ = self.on_event(kind);
        true
    }

    fn stop_accepting_events(&self) {
        *self.accepting_events.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

struct ActiveSubscription {
    id: SubscriptionId,
    pump: JoinHandle<()>,
}

/// Debounce-gated invalidation pipeline for one cached dataset
///
/// Subscribes to [`SUBSCRIBED_EVENTS`] at construction and stays subscribed
/// until [`teardown`](Self::teardown). Must be built inside a tokio runtime;
/// repopulates run on that runtime.
pub struct InvalidationCoordinator {
    inner: Arc<Inner>,
    source: Arc<dyn EventSource>,
    subscription: Mutex<Option<ActiveSubscription>>,
}

impl InvalidationCoordinator {
    /// Create a coordinator using the system clock
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn DataStore>,
        source: Arc<dyn EventSource>,
        config: &CoordinatorConfig,
    ) -> Result<Self, CoordinatorError> {
        Self::with_clock(name, store, source, config, Arc::new(SystemClock))
    }

    /// Create a coordinator with an explicit clock
    pub fn with_clock(
        name: impl Into<String>,
        store: Arc<dyn DataStore>,
        source: Arc<dyn EventSource>,
        config: &CoordinatorConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoordinatorError> {
        let name = name.into();
        debug!(%name, ?config, "InvalidationCoordinator::with_clock: called");
        let runtime = Handle::try_current().map_err(|_| CoordinatorError::NoRuntime)?;

        store.set_cache_size(config.cache_size);

        let (in_flight, _) = watch::channel(0usize);
        let inner = Arc::new(Inner {
            name,
            store,
            delegate: DelegateSlot::new(),
            last_invalidation_ns: AtomicI64::new(to_nanos(clock.now())),
            clock,
            debounce: config.debounce_interval(),
            limit: config.topsites_limit,
            in_flight,
            metrics: MetricsRecorder::default(),
            runtime: runtime.clone(),
            accepting_events: Mutex::new(true),
        });

        let subscription = source.subscribe(&SUBSCRIBED_EVENTS);
        let id = subscription.id;
        let mut rx = subscription.rx;
        let pump_inner = Arc::clone(&inner);
        let pump = runtime.spawn(async move {
            while let Some(notification) = rx.recv().await {
                if !pump_inner.pump_event(&notification.kind) {
                    break;
                }
            }
            debug!(coordinator = %pump_inner.name, "InvalidationCoordinator: event channel closed");
        });

        info!(coordinator = %inner.name, subscription = %id, "InvalidationCoordinator started");

        Ok(Self {
            inner,
            source,
            subscription: Mutex::new(Some(ActiveSubscription { id, pump })),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Request an invalidation
    ///
    /// Returns immediately. `None` means the store is shutting down and
    /// nothing happened; otherwise the handle resolves after `did_invalidate`.
    pub fn invalidate(&self, force_invalidate: bool) -> Option<JoinHandle<()>> {
        self.inner.invalidate(force_invalidate)
    }

    /// Handle a lifecycle notification
    ///
    /// Every handled kind forces an invalidation; other kinds are logged and ignored.
    pub fn on_event(&self, kind: &EventKind) -> Option<JoinHandle<()>> {
        self.inner.on_event(kind)
    }

    /// Attach an observer. The coordinator only keeps a weak reference.
    pub fn set_delegate<D: ObserverDelegate + 'static>(&self, delegate: &Arc<D>) {
        self.inner.delegate.set(delegate);
    }

    pub fn clear_delegate(&self) {
        self.inner.delegate.clear();
    }

    pub fn has_delegate(&self) -> bool {
        self.inner.delegate.is_present()
    }

    /// Time of the last invalidation that was allowed to force a refresh
    pub fn last_invalidation(&self) -> DateTime<Utc> {
        self.inner.last_invalidation()
    }

    pub fn debounce_interval(&self) -> Duration {
        self.inner.debounce
    }

    pub fn metrics(&self) -> CoordinatorMetrics {
        self.inner.metrics.snapshot(*self.inner.in_flight.borrow())
    }

    /// Wait until no repopulate issued by this coordinator is outstanding
    pub async fn settle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Unsubscribe from the event source
    ///
    /// Idempotent: returns false if already torn down. Once this returns, no
    /// notification is dispatched, including ones already queued. In-flight
    /// repopulates are not cancelled; their completions still reach a live
    /// delegate. Blocks while an event is being dispatched, so it must not be
    /// called from `will_invalidate`.
    pub fn teardown(&self) -> bool {
        let active = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        match active {
            Some(active) => {
                self.inner.stop_accepting_events();
                self.source.unsubscribe(active.id);
                active.pump.abort();
                info!(coordinator = %self.inner.name, subscription = %active.id, "InvalidationCoordinator torn down");
                true
            }
            None => {
                debug!(coordinator = %self.inner.name, "InvalidationCoordinator::teardown: already torn down");
                false
            }
        }
    }
}

impl Drop for InvalidationCoordinator {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::clock::ManualClock;
    use crate::coordinator::delegate::mock::RecordingDelegate;
    use crate::events::EventBus;
    use crate::store::MemoryStore;

    const MINUTE: Duration = Duration::from_secs(60);

    struct Fixture {
        store: Arc<MemoryStore>,
        bus: Arc<EventBus>,
        clock: Arc<ManualClock>,
        coordinator: InvalidationCoordinator,
    }

    fn fixture_with(store: MemoryStore) -> Fixture {
        let store = Arc::new(store);
        let bus = Arc::new(EventBus::new(16));
        let clock = Arc::new(ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()));
        let coordinator = InvalidationCoordinator::with_clock(
            "test",
            store.clone(),
            bus.clone(),
            &CoordinatorConfig::default(),
            clock.clone(),
        )
        .unwrap();
        Fixture {
            store,
            bus,
            clock,
            coordinator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryStore::new())
    }

    #[test]
    fn test_should_refresh() {
        let last = DateTime::from_timestamp(0, 0).unwrap();
        let window = 15 * MINUTE;

        assert!(should_refresh(true, last, last, window));
        assert!(!should_refresh(false, last + TimeDelta::minutes(15), last, window));
        assert!(should_refresh(false, last + TimeDelta::minutes(15) + TimeDelta::milliseconds(1), last, window));
        // Clock moved backwards
        assert!(!should_refresh(false, last - TimeDelta::minutes(30), last, window));
    }

    #[test]
    fn test_request_from_event() {
        for kind in SUBSCRIBED_EVENTS.iter() {
            assert_eq!(
                InvalidationRequest::from_event(kind),
                Some(InvalidationRequest { force_invalidate: true })
            );
        }
        assert_eq!(
            InvalidationRequest::from_event(&EventKind::Other("tab-opened".to_string())),
            None
        );
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = InvalidationCoordinator::new(
            "no-runtime",
            Arc::new(MemoryStore::new()),
            Arc::new(EventBus::new(16)),
            &CoordinatorConfig::default(),
        );
        assert!(matches!(result, Err(CoordinatorError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_construction_sets_cache_size_and_subscribes() {
        let f = fixture();
        assert_eq!(f.store.cache_size(), 16);
        assert_eq!(f.store.cache_size_calls(), 1);
        assert!(f.coordinator.is_subscribed());
        assert_eq!(f.bus.subscriber_count(), 1);
        for kind in SUBSCRIBED_EVENTS.iter() {
            assert_eq!(f.bus.subscribers_for(kind), 1);
        }
        assert_eq!(f.coordinator.last_invalidation(), f.clock.now());
    }

    #[tokio::test]
    async fn test_forced_invalidate_advances_timestamp() {
        let f = fixture();
        f.clock.advance(MINUTE);

        f.coordinator.invalidate(true).unwrap().await.unwrap();

        let calls = f.store.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].force_refresh);
        assert_eq!(calls[0].limit, 16);
        assert_eq!(f.coordinator.last_invalidation(), f.clock.now());
    }

    #[tokio::test]
    async fn test_timestamp_keeps_sub_millisecond_precision() {
        let f = fixture();
        f.clock.advance(Duration::from_micros(1500));

        f.coordinator.invalidate(true).unwrap().await.unwrap();
        let accepted = f.clock.now();
        assert_eq!(f.coordinator.last_invalidation(), accepted);

        // Exactly one window later is still inside it
        f.clock.advance(15 * MINUTE);
        f.coordinator.invalidate(false).unwrap().await.unwrap();

        let calls = f.store.calls();
        assert!(calls[0].force_refresh);
        assert!(!calls[1].force_refresh);
        assert_eq!(f.coordinator.last_invalidation(), accepted);
    }

    #[tokio::test]
    async fn test_soft_invalidate_within_window() {
        let f = fixture();
        let before = f.coordinator.last_invalidation();
        f.clock.advance(5 * MINUTE);

        f.coordinator.invalidate(false).unwrap().await.unwrap();

        let calls = f.store.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].force_refresh);
        assert_eq!(f.coordinator.last_invalidation(), before);
    }

    #[tokio::test]
    async fn test_soft_invalidate_after_window_forces() {
        let f = fixture();
        f.clock.advance(16 * MINUTE);

        f.coordinator.invalidate(false).unwrap().await.unwrap();

        assert!(f.store.calls()[0].force_refresh);
        assert_eq!(f.coordinator.last_invalidation(), f.clock.now());
    }

    #[tokio::test]
    async fn test_callbacks_bracket_store_call() {
        let f = fixture_with(MemoryStore::new().gated());
        let delegate = RecordingDelegate::new();
        f.coordinator.set_delegate(&delegate);

        let handle = f.coordinator.invalidate(true).unwrap();
        assert_eq!(delegate.log(), vec!["will"]);

        f.store.release(1);
        handle.await.unwrap();
        assert_eq!(delegate.log(), vec!["will", "did"]);
        assert_eq!(f.store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_still_notifies() {
        let f = fixture_with(MemoryStore::new().with_failure_every(1));
        let delegate = RecordingDelegate::new();
        f.coordinator.set_delegate(&delegate);

        f.coordinator.invalidate(true).unwrap().await.unwrap();

        assert_eq!(delegate.log(), vec!["will", "did"]);
        let metrics = f.coordinator.metrics();
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.completed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_skips_everything() {
        let f = fixture();
        let delegate = RecordingDelegate::new();
        f.coordinator.set_delegate(&delegate);
        let before = f.coordinator.last_invalidation();
        f.store.begin_shutdown();
        f.clock.advance(MINUTE);

        assert!(f.coordinator.invalidate(true).is_none());

        assert!(delegate.log().is_empty());
        assert_eq!(f.store.call_count(), 0);
        assert_eq!(f.coordinator.last_invalidation(), before);
        assert_eq!(f.coordinator.metrics().skipped_shutdown, 1);
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let f = fixture();
        let before = f.coordinator.last_invalidation();
        f.clock.advance(MINUTE);

        assert!(f.coordinator.on_event(&EventKind::Other("tab-opened".to_string())).is_none());

        assert_eq!(f.store.call_count(), 0);
        assert_eq!(f.coordinator.last_invalidation(), before);
        let metrics = f.coordinator.metrics();
        assert_eq!(metrics.events_received, 1);
        assert_eq!(metrics.ignored_events, 1);
        assert_eq!(metrics.requested, 0);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let f = fixture();
        assert!(f.coordinator.teardown());
        assert!(!f.coordinator.teardown());
        assert!(!f.coordinator.is_subscribed());
        assert_eq!(f.bus.subscriber_count(), 0);
        assert_eq!(f.bus.emit(EventKind::SyncFinished), 0);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let f = fixture();
        let bus = f.bus.clone();
        drop(f);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_no_dispatch_after_teardown() {
        let f = fixture();
        assert!(f.coordinator.inner.pump_event(&EventKind::SyncFinished));
        f.coordinator.settle().await;
        assert_eq!(f.store.call_count(), 1);

        f.coordinator.teardown();

        assert!(!f.coordinator.inner.pump_event(&EventKind::SyncFinished));
        assert_eq!(f.coordinator.metrics().requested, 1);
        assert_eq!(f.coordinator.metrics().events_received, 1);
    }

    struct PanickingDelegate;

    impl ObserverDelegate for PanickingDelegate {
        fn will_invalidate(&self) {}

        fn did_invalidate(&self) {
            panic!("did_invalidate failed");
        }
    }

    #[tokio::test]
    async fn test_panicking_delegate_does_not_wedge_settle() {
        let f = fixture();
        let delegate = Arc::new(PanickingDelegate);
        f.coordinator.set_delegate(&delegate);

        let result = f.coordinator.invalidate(true).unwrap().await;
        assert!(result.unwrap_err().is_panic());

        tokio::time::timeout(Duration::from_secs(1), f.coordinator.settle())
            .await
            .expect("settle should return once the task has ended");
        assert_eq!(f.coordinator.metrics().in_flight, 0);
        assert_eq!(f.coordinator.metrics().completed, 1);
    }

    #[tokio::test]
    async fn test_settle_waits_for_in_flight() {
        let f = fixture_with(MemoryStore::new().with_latency(Duration::from_millis(20)));
        let _ = f.coordinator.invalidate(true);
        let _ = f.coordinator.invalidate(false);
        assert_eq!(f.coordinator.metrics().in_flight, 2);

        f.coordinator.settle().await;

        assert_eq!(f.coordinator.metrics().in_flight, 0);
        assert_eq!(f.store.finished_count(), 2);
    }
}
