#![forbid(unsafe_code)]
//! reclaim-exec: the async side of reclaim.
//!
//! - `registry`: binds in-flight tasks to handles and releases them exactly
//!   once when the task settles.
//! - `monitor`: periodic heap sampling, collection hints, deferred compaction
//!   during idle windows, and per-operation sample tracking.
//! - `chunked`: slice large workloads and yield to the scheduler in between.
//! - `lifecycle`: trace events for releases and compactions.
//!
//! Everything here needs a Tokio runtime. A `current_thread` runtime is the
//! reference model; the multi-threaded runtime works too.

pub mod chunked;
pub mod lifecycle;
pub mod monitor;
pub mod registry;

pub use chunked::ChunkReport;
pub use monitor::{
    Compaction, MemoryMonitor, MonitorState, MonitorStats, OperationRecord, TickOutcome,
};
pub use registry::{
    teardown, AsyncResourceRegistry, BindingInfo, CleanupCause, RegistryEvent, RegistryStats,
    Teardown,
};
