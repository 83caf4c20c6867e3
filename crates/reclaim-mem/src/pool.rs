//! Tag-keyed handle pool with last-released-first reuse.
//!
//! The pool is a cheap `Clone`: clones share the same slots, so a reconciler,
//! an async registry and outstanding leases can all return handles to one
//! place.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reclaim_core::handle::{HandleHost, Reclaim};

use crate::guard::Lease;
use crate::tracking::{PoolCounters, PoolStats};

/// Where an acquired handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Popped from the tag's pool.
    Reused,
    /// Freshly built by the host.
    Constructed,
}

struct PoolInner<S: HandleHost> {
    host: S,
    slots: Mutex<HashMap<String, Vec<S::Handle>>>,
    counters: PoolCounters,
}

pub struct ResourcePool<S: HandleHost> {
    inner: Arc<PoolInner<S>>,
}

impl<S: HandleHost> Clone for ResourcePool<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: HandleHost> fmt::Debug for ResourcePool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("stats", &self.stats())
            .finish()
    }
}

impl<S: HandleHost> ResourcePool<S> {
    pub fn new(host: S) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                host,
                slots: Mutex::new(HashMap::new()),
                counters: PoolCounters::default(),
            }),
        }
    }

    pub fn host(&self) -> &S {
        &self.inner.host
    }

    /// Hand out a handle for `tag`: the most recently released one if any,
    /// otherwise a freshly constructed one.
    pub fn acquire(&self, tag: &str) -> S::Handle {
        self.acquire_traced(tag).0
    }

    /// Like [`acquire`](Self::acquire), but also reports whether the handle
    /// was reused or constructed.
    pub fn acquire_traced(&self, tag: &str) -> (S::Handle, Origin) {
        let reused = self.slots().get_mut(tag).and_then(Vec::pop);
        match reused {
            Some(handle) => {
                self.inner.counters.reused();
                #[cfg(feature = "tracing")]
                tracing::trace!(tag, "reused pooled handle");
                (handle, Origin::Reused)
            }
            None => {
                // Construct outside the lock; the host may be slow.
                let handle = self.inner.host.construct(tag);
                self.inner.counters.constructed();
                #[cfg(feature = "tracing")]
                tracing::trace!(tag, "constructed handle");
                (handle, Origin::Constructed)
            }
        }
    }

    /// Acquire a handle wrapped in a guard that releases it on drop.
    pub fn lease(&self, tag: &str) -> Lease<S> {
        Lease::new(self.clone(), self.acquire(tag))
    }

    /// Sanitize `handle` and push it onto its tag's pool.
    pub fn release(&self, mut handle: S::Handle) {
        let tag = self.inner.host.tag_of(&handle);
        self.inner.host.sanitize(&mut handle);

        let available = {
            let mut slots = self.slots();
            slots.entry(tag).or_default().push(handle);
            slots.values().map(Vec::len).sum()
        };
        self.inner.counters.released();
        self.inner.counters.record_available(available);
    }

    /// Number of handles available for `tag`.
    pub fn available(&self, tag: &str) -> usize {
        self.slots().get(tag).map_or(0, Vec::len)
    }

    /// Number of handles available across all tags.
    pub fn total_available(&self) -> usize {
        self.slots().values().map(Vec::len).sum()
    }

    /// Tags that currently hold at least one available handle, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .slots()
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect();
        tags.sort();
        tags
    }

    /// Drop every available handle for `tag`. In-use handles are untouched.
    /// Returns how many handles were dropped.
    pub fn clear_pool(&self, tag: &str) -> usize {
        let dropped = self.slots().remove(tag).unwrap_or_default();
        let n = dropped.len();
        // Drop outside the lock.
        drop(dropped);
        self.inner.counters.cleared(n);
        n
    }

    /// Drop every available handle for every tag.
    pub fn clear_all_pools(&self) -> usize {
        let dropped = std::mem::take(&mut *self.slots());
        let n = dropped.values().map(Vec::len).sum();
        drop(dropped);
        self.inner.counters.cleared(n);
        #[cfg(feature = "tracing")]
        tracing::debug!(dropped = n, "cleared all pools");
        n
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.counters.snapshot(self.total_available())
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Vec<S::Handle>>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: HandleHost> Reclaim<S::Handle> for ResourcePool<S> {
    fn reclaim(&self, handle: S::Handle) {
        self.release(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Node, NodeHost};

    #[test]
    fn acquire_constructs_when_empty() {
        let pool = ResourcePool::new(NodeHost::default());
        let (node, origin) = pool.acquire_traced("div");
        assert_eq!(origin, Origin::Constructed);
        assert_eq!(node.tag, "div");
        assert_eq!(pool.host().constructed(), 1);
    }

    #[test]
    fn release_then_acquire_is_lifo() {
        let pool = ResourcePool::new(NodeHost::default());
        let a = pool.acquire("div");
        let b = pool.acquire("div");
        let (a_id, b_id) = (a.id, b.id);
        pool.release(a);
        pool.release(b);

        assert_eq!(pool.acquire("div").id, b_id);
        assert_eq!(pool.acquire("div").id, a_id);
        assert_eq!(pool.available("div"), 0);
    }

    #[test]
    fn release_sanitizes_and_files_under_handle_tag() {
        let pool = ResourcePool::new(NodeHost::default());
        let mut node = pool.acquire("li");
        node.content = "stale".into();
        node.listeners.push("click".into());
        pool.release(node);

        assert_eq!(pool.available("li"), 1);
        assert_eq!(pool.available("div"), 0);
        let node: Node = pool.acquire("li");
        assert!(node.content.is_empty());
        assert!(node.listeners.is_empty());
        assert_eq!(pool.host().sanitized(), 1);
    }

    #[test]
    fn round_trip_keeps_pool_size() {
        let pool = ResourcePool::new(NodeHost::default());
        pool.release(pool.acquire("div"));
        pool.release(pool.acquire("div"));
        let before = pool.available("div");
        pool.release(pool.acquire("div"));
        assert_eq!(pool.available("div"), before);
    }

    #[test]
    fn clear_pool_only_touches_one_tag() {
        let pool = ResourcePool::new(NodeHost::default());
        pool.release(pool.host().construct("div"));
        pool.release(pool.host().construct("div"));
        pool.release(pool.host().construct("span"));

        assert_eq!(pool.clear_pool("div"), 2);
        assert_eq!(pool.available("div"), 0);
        assert_eq!(pool.tags(), vec!["span".to_string()]);
        assert_eq!(pool.clear_all_pools(), 1);
        assert_eq!(pool.total_available(), 0);
        assert_eq!(pool.stats().cleared, 3);
    }

    #[test]
    fn stats_track_reuse() {
        let pool = ResourcePool::new(NodeHost::default());
        let a = pool.acquire("div");
        pool.release(a);
        let _b = pool.acquire("div");
        let stats = pool.stats();
        assert_eq!(stats.constructed, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.released, 1);
        assert_eq!(stats.peak_available, 1);
        assert!((stats.reuse_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
