//! Platform telemetry seam.
//!
//! The host supplies the concrete implementation (a `sysinfo` reader, an
//! allocator hook, a scripted fake in tests). Readings are best-effort: a
//! runtime that cannot measure returns `None` and the monitor skips the tick.

/// Best-effort process memory readings plus an optional collection hint.
pub trait PlatformMetrics: Send + Sync + 'static {
    /// Current heap usage in bytes, or `None` when unavailable.
    fn current_heap_usage(&self) -> Option<u64>;

    /// Hint that now is a good time to reclaim memory. May be a no-op.
    fn request_collection(&self) {}
}

/// Telemetry source for runtimes that cannot measure anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetrics;

impl PlatformMetrics for NoMetrics {
    fn current_heap_usage(&self) -> Option<u64> {
        None
    }
}

impl<M: PlatformMetrics + ?Sized> PlatformMetrics for std::sync::Arc<M> {
    fn current_heap_usage(&self) -> Option<u64> {
        (**self).current_heap_usage()
    }

    fn request_collection(&self) {
        (**self).request_collection()
    }
}
