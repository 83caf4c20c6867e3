//! RAII lease over a pooled handle.
//!
//! Dropping the lease sanitizes the handle and returns it to its pool
//! (panic-safe). Call `into_inner` to keep the handle instead.

use std::ops::{Deref, DerefMut};

use reclaim_core::handle::HandleHost;

use crate::pool::ResourcePool;

pub struct Lease<S: HandleHost> {
    pool: ResourcePool<S>,
    // Only `None` after `into_inner` or during drop.
    handle: Option<S::Handle>,
}

impl<S: HandleHost> Lease<S> {
    pub(crate) fn new(pool: ResourcePool<S>, handle: S::Handle) -> Self {
        Self {
            pool,
            handle: Some(handle),
        }
    }

    /// Detach the handle from the lease; it will not be returned on drop.
    pub fn into_inner(mut self) -> S::Handle {
        match self.handle.take() {
            Some(handle) => handle,
            None => unreachable!("lease emptied before into_inner"),
        }
    }
}

impl<S: HandleHost> Deref for Lease<S> {
    type Target = S::Handle;

    fn deref(&self) -> &Self::Target {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("lease emptied before drop"),
        }
    }
}

impl<S: HandleHost> DerefMut for Lease<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.handle {
            Some(handle) => handle,
            None => unreachable!("lease emptied before drop"),
        }
    }
}

impl<S: HandleHost> Drop for Lease<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // NOTE: release sanitizes; do not log here to keep drop path fast.
            self.pool.release(handle);
        }
    }
}
