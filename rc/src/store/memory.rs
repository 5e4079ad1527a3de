//! MemoryStore - in-process stand-in for the recommendations store
//!
//! Records every repopulate request, can simulate latency and periodic
//! failures, and can hold completions behind a gate so callers can observe
//! the window between issuing a repopulate and its completion.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{DataStore, StoreError};
use crate::config::StoreConfig;

/// One recorded repopulate request
#[derive(Debug, Clone, Serialize)]
pub struct RepopulateCall {
    #[serde(rename = "force-refresh")]
    pub force_refresh: bool,
    pub limit: usize,
    #[serde(rename = "issued-at")]
    pub issued_at: DateTime<Utc>,
}

/// Simulated data store
#[derive(Debug, Default)]
pub struct MemoryStore {
    shutting_down: AtomicBool,
    cache_size: AtomicI32,
    cache_size_calls: AtomicUsize,
    latency: Duration,
    fail_every: Option<u32>,
    calls: Mutex<Vec<RepopulateCall>>,
    finished: AtomicUsize,
    gate: Option<Semaphore>,
}

impl MemoryStore {
    /// Create a store that completes immediately and never fails
    pub fn new() -> Self {
        debug!("MemoryStore::new: called");
        Self::default()
    }

    /// Create a store from configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        debug!(?config, "MemoryStore::from_config: called");
        Self {
            latency: config.latency(),
            fail_every: config.fail_every,
            ..Self::default()
        }
    }

    /// Delay every repopulate by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every `n`th repopulate (1-based); `0` disables failures
    pub fn with_failure_every(mut self, n: u32) -> Self {
        self.fail_every = Some(n);
        self
    }

    /// Hold every repopulate until [`release`](Self::release) grants it a permit
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let `n` gated repopulates run to completion
    pub fn release(&self, n: usize) {
        debug!(n, "MemoryStore::release: called");
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Flip the shutdown flag
    pub fn begin_shutdown(&self) {
        debug!("MemoryStore::begin_shutdown: called");
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// All repopulate requests issued so far, in order
    pub fn calls(&self) -> Vec<RepopulateCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of repopulates that ran to completion (successful or not)
    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Last cache size set, or 0 if never set
    pub fn cache_size(&self) -> i32 {
        self.cache_size.load(Ordering::SeqCst)
    }

    pub fn cache_size_calls(&self) -> usize {
        self.cache_size_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn set_cache_size(&self, size: i32) {
        debug!(size, "MemoryStore::set_cache_size: called");
        self.cache_size.store(size, Ordering::SeqCst);
        self.cache_size_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn repopulate(&self, force_refresh: bool, limit: usize) -> Result<(), StoreError> {
        let call_no = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push(RepopulateCall {
                force_refresh,
                limit,
                issued_at: Utc::now(),
            });
            calls.len()
        };
        debug!(call_no, force_refresh, limit, "MemoryStore::repopulate: called");

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| StoreError::ShuttingDown)?;
            permit.forget();
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.finished.fetch_add(1, Ordering::SeqCst);

        if let Some(n) = self.fail_every
            && n > 0
            && call_no % n as usize == 0
        {
            debug!(call_no, "MemoryStore::repopulate: simulated failure");
            return Err(StoreError::Unavailable(format!("simulated failure on call {}", call_no)));
        }

        debug!(call_no, "MemoryStore::repopulate: done");
        Ok(())
    }
}
