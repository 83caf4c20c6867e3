//! Host capabilities for externally-owned handles.
//!
//! The core never knows what a handle *is*. The host tells it how to build one
//! for a tag, how to scrub one before reuse, and which tag a handle belongs to.

/// Construction and sanitizing capabilities for one family of handles.
///
/// `sanitize` must leave the handle neutral: no attached observers, no
/// residual content. A pooled handle is always sanitized.
pub trait HandleHost: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Build a brand-new handle for `tag`.
    fn construct(&self, tag: &str) -> Self::Handle;

    /// Reset `handle` to a neutral state. Must not change its identity.
    fn sanitize(&self, handle: &mut Self::Handle);

    /// The tag a handle was built for (its runtime "type").
    fn tag_of(&self, handle: &Self::Handle) -> String;
}

/// Somewhere a finished handle can be handed back to.
///
/// Implemented by `reclaim-mem::ResourcePool` (sanitize + pool) and by
/// [`ReclaimFn`] for host-specific detach.
pub trait Reclaim<H>: Send + Sync {
    fn reclaim(&self, handle: H);
}

/// Adapts a plain closure into a [`Reclaim`] sink.
pub struct ReclaimFn<F>(pub F);

impl<H, F> Reclaim<H> for ReclaimFn<F>
where
    F: Fn(H) + Send + Sync,
{
    fn reclaim(&self, handle: H) {
        (self.0)(handle)
    }
}
