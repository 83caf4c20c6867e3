#![forbid(unsafe_code)]
//! reclaim-core: shared traits, tokens, configuration, and errors.
//!
//! Everything the other crates agree on lives here: the host capabilities
//! (`HandleHost`, `Reclaim`), the telemetry seam (`PlatformMetrics`), opaque
//! tokens, and `MonitorConfig`. No async, no allocator or pooling logic.

pub mod config;
pub mod error;
pub mod handle;
pub mod id;
pub mod metrics;
pub mod prelude;
pub mod time;

pub use config::{MonitorConfig, Retention};
pub use error::{Error, Result};
pub use handle::{HandleHost, Reclaim, ReclaimFn};
pub use id::{BindingToken, OperationToken};
pub use metrics::PlatformMetrics;
