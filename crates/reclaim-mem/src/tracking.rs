//! Lightweight pool counters.
//!
//! Keep this cheap: relaxed atomics only. Downstream can export `PoolStats`
//! to whatever telemetry it likes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

#[derive(Default)]
pub(crate) struct PoolCounters {
    constructed: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
    cleared: AtomicU64,
    peak_available: AtomicUsize,
}

impl PoolCounters {
    pub(crate) fn constructed(&self) {
        self.constructed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn released(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cleared(&self, n: usize) {
        self.cleared.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record the current number of pooled handles; updates peak if higher.
    pub(crate) fn record_available(&self, available: usize) {
        let mut cur = self.peak_available.load(Ordering::Relaxed);
        while available > cur {
            match self.peak_available.compare_exchange(
                cur,
                available,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    pub(crate) fn snapshot(&self, available: usize) -> PoolStats {
        PoolStats {
            constructed: self.constructed.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            available,
            peak_available: self.peak_available.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a pool's activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStats {
    /// Handles built by the host because the tag's pool was empty.
    pub constructed: u64,
    /// Acquisitions served from the pool.
    pub reused: u64,
    /// Handles sanitized and pushed back.
    pub released: u64,
    /// Available handles dropped by `clear_pool`/`clear_all_pools`.
    pub cleared: u64,
    /// Handles currently available across all tags.
    pub available: usize,
    pub peak_available: usize,
}

impl PoolStats {
    /// Fraction of acquisitions that were served from the pool.
    pub fn reuse_ratio(&self) -> f64 {
        let total = self.constructed + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}
