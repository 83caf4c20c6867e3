//! Usage-pattern learner.
//!
//! Every sample taken for a named operation is appended to that operation's
//! series. Once a series holds more than `report_after` samples, the learner
//! starts reporting a summary for it. Reporting is observability only; it
//! never alters the stored samples.

use std::collections::HashMap;

use serde::Serialize;

use reclaim_core::config::{MonitorConfig, Retention};

use crate::series::SampleSeries;

/// Samples a label needs to exceed before it is summarized.
pub const DEFAULT_REPORT_AFTER: usize = 5;

/// Derived statistics for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSummary {
    pub label: String,
    pub samples: usize,
    pub mean_bytes: f64,
    pub min_bytes: u64,
    pub max_bytes: u64,
    pub last_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UsagePatternLearner {
    series: HashMap<String, SampleSeries>,
    retention: Retention,
    report_after: usize,
}

impl Default for UsagePatternLearner {
    fn default() -> Self {
        Self::new(Retention::Unbounded, DEFAULT_REPORT_AFTER)
    }
}

impl UsagePatternLearner {
    pub fn new(retention: Retention, report_after: usize) -> Self {
        Self {
            series: HashMap::new(),
            retention,
            report_after,
        }
    }

    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self::new(cfg.retention, cfg.report_after)
    }

    pub fn report_after(&self) -> usize {
        self.report_after
    }

    /// Append `bytes` to `label`'s series. Returns a summary when the label
    /// is eligible for reporting.
    pub fn record_sample(&mut self, label: &str, bytes: u64) -> Option<PatternSummary> {
        let retention = self.retention;
        self.series
            .entry(label.to_string())
            .or_insert_with(|| SampleSeries::new(retention))
            .push(bytes);

        let summary = self.summary(label)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            label,
            samples = summary.samples,
            mean_mib = summary.mean_bytes / (1024.0 * 1024.0),
            "usage pattern"
        );
        Some(summary)
    }

    /// True once `label` holds more than `report_after` samples.
    pub fn is_eligible(&self, label: &str) -> bool {
        self.series
            .get(label)
            .map_or(false, |s| s.len() > self.report_after)
    }

    /// Summary for `label`, or `None` if it is not yet eligible.
    pub fn summary(&self, label: &str) -> Option<PatternSummary> {
        if !self.is_eligible(label) {
            return None;
        }
        let series = self.series.get(label)?;
        Some(PatternSummary {
            label: label.to_string(),
            samples: series.len(),
            mean_bytes: series.mean(),
            min_bytes: series.min()?,
            max_bytes: series.max()?,
            last_bytes: series.last()?,
        })
    }

    /// Summaries for every eligible label, sorted by label.
    pub fn summaries(&self) -> Vec<PatternSummary> {
        let mut out: Vec<PatternSummary> = self
            .series
            .keys()
            .filter_map(|label| self.summary(label))
            .collect();
        out.sort_by(|a, b| a.label.cmp(&b.label));
        out
    }

    pub fn series(&self, label: &str) -> Option<&SampleSeries> {
        self.series.get(label)
    }

    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.series.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Drop the history for one label. Returns whether it existed.
    pub fn forget(&mut self, label: &str) -> bool {
        self.series.remove(label).is_some()
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}
