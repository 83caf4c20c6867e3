//! Monitor configuration that downstream crates can serialize/deserialize.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MIB: u64 = 1024 * 1024;

/// How much sample history the learner keeps per label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Keep every sample for the lifetime of the learner.
    #[default]
    Unbounded,
    /// Ring buffer holding only the newest `n` samples.
    Window(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Heap usage (bytes) above which a collection hint is requested.
    pub threshold_bytes: u64,

    /// Sampling cadence of the running monitor. Must be non-zero.
    pub interval_ms: u64,

    /// Delay between scheduling a deferred compaction and running it.
    pub compaction_delay_ms: u64,

    /// Slice size used by chunked processing.
    pub chunk_size: usize,

    /// A label's series must hold *more than* this many samples before the
    /// learner reports a summary for it.
    pub report_after: usize,

    /// Per-label sample retention.
    pub retention: Retention,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: 200 * MIB,
            interval_ms: 5_000,
            compaction_delay_ms: 1_000,
            chunk_size: 1_000,
            report_after: 5,
            retention: Retention::Unbounded,
        }
    }
}

impl MonitorConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `RECLAIM_THRESHOLD_BYTES`: collection threshold in bytes
    /// - `RECLAIM_INTERVAL_MS`: sampling interval
    /// - `RECLAIM_COMPACTION_DELAY_MS`: deferred compaction delay
    /// - `RECLAIM_CHUNK_SIZE`: chunked processing slice size
    /// - `RECLAIM_REPORT_AFTER`: learner reporting threshold
    /// - `RECLAIM_HISTORY_WINDOW`: keep only the newest N samples per label
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<u64>("RECLAIM_THRESHOLD_BYTES") {
            cfg.threshold_bytes = v;
        }
        if let Some(v) = env_parse::<u64>("RECLAIM_INTERVAL_MS") {
            cfg.interval_ms = v;
        }
        if let Some(v) = env_parse::<u64>("RECLAIM_COMPACTION_DELAY_MS") {
            cfg.compaction_delay_ms = v;
        }
        if let Some(v) = env_parse::<usize>("RECLAIM_CHUNK_SIZE") {
            cfg.chunk_size = v;
        }
        if let Some(v) = env_parse::<usize>("RECLAIM_REPORT_AFTER") {
            cfg.report_after = v;
        }
        if let Some(v) = env_parse::<usize>("RECLAIM_HISTORY_WINDOW") {
            cfg.retention = Retention::Window(v);
        }

        cfg
    }

    /// Reject settings the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Config("interval_ms must be greater than 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".into()));
        }
        if let Retention::Window(n) = self.retention {
            if n == 0 {
                return Err(Error::Config(
                    "history window must hold at least one sample".into(),
                ));
            }
            // A label is summarized only past `report_after` samples.
            if n <= self.report_after {
                return Err(Error::Config(format!(
                    "history window ({n}) must exceed report_after ({}) or no summary is ever produced",
                    self.report_after
                )));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn compaction_delay(&self) -> Duration {
        Duration::from_millis(self.compaction_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.threshold_bytes, 200 * 1024 * 1024);
        assert_eq!(cfg.interval(), Duration::from_secs(5));
        assert_eq!(cfg.chunk_size, 1000);
        assert_eq!(cfg.report_after, 5);
        assert_eq!(cfg.retention, Retention::Unbounded);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: MonitorConfig =
            serde_json::from_str(r#"{"threshold_bytes": 1024, "retention": {"window": 8}}"#)
                .unwrap();
        assert_eq!(cfg.threshold_bytes, 1024);
        assert_eq!(cfg.retention, Retention::Window(8));
        assert_eq!(cfg.interval_ms, 5_000);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = MonitorConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn window_must_exceed_report_after() {
        let mut cfg = MonitorConfig {
            retention: Retention::Window(5),
            report_after: 5,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        cfg.retention = Retention::Window(6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_window_is_rejected() {
        let cfg = MonitorConfig {
            retention: Retention::Window(0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
