#![forbid(unsafe_code)]
//! reclaim-learn: per-label sample history and summary statistics.
//!
//! Responsibilities:
//! - Keep an ordered byte-sample series per operation label.
//! - Apply an explicit retention policy (unbounded or ring window).
//! - Derive a mean once a label has enough samples to be worth reporting.
//!
//! **No timers, no telemetry sources** here. The monitor in `reclaim-exec`
//! feeds samples in.

pub mod learner;
pub mod series;

pub use learner::{PatternSummary, UsagePatternLearner, DEFAULT_REPORT_AFTER};
pub use series::{average, SampleSeries};
