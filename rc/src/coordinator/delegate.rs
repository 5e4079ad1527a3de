//! Observer delegate and its weak slot

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

/// Receives before/after notifications around each invalidation
///
/// `did_invalidate` is delivered from whichever runtime worker completed the
/// repopulate, not necessarily the thread that called `invalidate`.
pub trait ObserverDelegate: Send + Sync {
    fn will_invalidate(&self);
    fn did_invalidate(&self);
}

/// Weak, replaceable reference to an [`ObserverDelegate`]
///
/// The slot never extends the delegate's lifetime. An empty slot or a dropped
/// delegate both read as `None`.
#[derive(Default)]
pub struct DelegateSlot {
    inner: RwLock<Option<Weak<dyn ObserverDelegate>>>,
}

impl DelegateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the slot at `delegate` without taking ownership
    pub fn set<D: ObserverDelegate + 'static>(&self, delegate: &Arc<D>) {
        debug!("DelegateSlot::set: called");
        let weak: Weak<D> = Arc::downgrade(delegate);
        let weak: Weak<dyn ObserverDelegate> = weak;
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    pub fn clear(&self) {
        debug!("DelegateSlot::clear: called");
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Upgrade to a strong reference for the duration of one callback
    pub fn get(&self) -> Option<Arc<dyn ObserverDelegate>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::mock::RecordingDelegate;
    use super::*;

    #[test]
    fn test_empty_slot() {
        let slot = DelegateSlot::new();
        assert!(slot.get().is_none());
        assert!(!slot.is_present());
    }

    #[test]
    fn test_slot_does_not_own_delegate() {
        let slot = DelegateSlot::new();
        let delegate = RecordingDelegate::new();
        slot.set(&delegate);
        assert!(slot.is_present());
        assert_eq!(Arc::strong_count(&delegate), 1);

        drop(delegate);
        assert!(slot.get().is_none());
    }

    #[test]
    fn test_clear() {
        let slot = DelegateSlot::new();
        let delegate = RecordingDelegate::new();
        slot.set(&delegate);
        slot.clear();
        assert!(!slot.is_present());
    }

    #[test]
    fn test_callbacks_through_slot() {
        let slot = DelegateSlot::new();
        let delegate = RecordingDelegate::new();
        slot.set(&delegate);

        if let Some(d) = slot.get() {
            d.will_invalidate();
            d.did_invalidate();
        }
        assert_eq!(delegate.log(), vec!["will", "did"]);
    }
}
