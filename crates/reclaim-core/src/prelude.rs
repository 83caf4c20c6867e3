//! Convenient re-exports for downstream crates.

pub use crate::config::{MonitorConfig, Retention, MIB};
pub use crate::error::{Error, Result};
pub use crate::handle::{HandleHost, Reclaim, ReclaimFn};
pub use crate::id::{BindingToken, OperationToken};
pub use crate::metrics::{NoMetrics, PlatformMetrics};
pub use crate::time::now_ms;
