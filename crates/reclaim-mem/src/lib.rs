#![forbid(unsafe_code)]
//! reclaim-mem: typed handle pools and container reconciliation.
//!
//! This crate provides the concrete pool behind the `HandleHost` capability
//! from `reclaim-core`. Handles move *out* of the pool on acquire and back *in*
//! on release, so ownership alone guarantees a handle is never both available
//! and in use.
//!
//! No async lives here. The async registry in `reclaim-exec` returns handles
//! through the `Reclaim` impl on `ResourcePool`.

pub mod guard;
pub mod pool;
pub mod reconcile;
pub mod tracking;

pub use guard::Lease;
pub use pool::{Origin, ResourcePool};
pub use reconcile::{Container, ContainerReconciler, ReconcileReport};
pub use tracking::PoolStats;

#[cfg(test)]
pub(crate) mod testing;
