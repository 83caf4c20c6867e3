//! Usage-pattern learning through the learner and through the monitor.

mod common;

use common::ScriptedMetrics;
use reclaim_core::config::{MonitorConfig, Retention};
use reclaim_exec::MemoryMonitor;
use reclaim_learn::{average, UsagePatternLearner};

#[test]
fn average_of_known_samples() {
    assert_eq!(average(&[100, 200, 300]), 200.0);
    assert_eq!(average(&[]), 0.0);
    assert_eq!(average(&[u64::MAX, u64::MAX]), u64::MAX as f64);
}

#[test]
fn reports_only_after_more_than_five_samples() {
    let mut learner = UsagePatternLearner::default();
    for bytes in [100, 200, 300, 400, 500] {
        assert!(learner.record_sample("parse", bytes).is_none());
    }
    assert!(!learner.is_eligible("parse"));

    let summary = learner.record_sample("parse", 600).unwrap();
    assert!(learner.is_eligible("parse"));
    assert_eq!(summary.samples, 6);
    assert_eq!(summary.mean_bytes, 350.0);
    assert_eq!(summary.min_bytes, 100);
    assert_eq!(summary.max_bytes, 600);
    assert_eq!(summary.last_bytes, 600);
}

#[test]
fn labels_learn_independently() {
    let mut learner = UsagePatternLearner::new(Retention::Unbounded, 1);
    learner.record_sample("a", 10);
    learner.record_sample("a", 30);
    learner.record_sample("b", 5);

    let summaries = learner.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].label, "a");
    assert_eq!(summaries[0].mean_bytes, 20.0);
    assert_eq!(learner.labels(), vec!["a", "b"]);
}

#[test]
fn window_retention_keeps_most_recent() {
    let mut learner = UsagePatternLearner::new(Retention::Window(3), 2);
    for bytes in 1..=10 {
        learner.record_sample("render", bytes * 100);
    }
    let series = learner.series("render").unwrap();
    assert_eq!(series.to_vec(), vec![800, 900, 1_000]);

    let summary = learner.summary("render").unwrap();
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.mean_bytes, 900.0);
}

#[test]
fn unbounded_retention_keeps_everything() {
    let mut learner = UsagePatternLearner::default();
    for bytes in 0..1_000 {
        learner.record_sample("grow", bytes);
    }
    assert_eq!(learner.series("grow").unwrap().len(), 1_000);
}

#[test]
fn forget_drops_history() {
    let mut learner = UsagePatternLearner::new(Retention::Unbounded, 0);
    learner.record_sample("x", 1);
    assert!(learner.forget("x"));
    assert!(!learner.forget("x"));
    assert!(learner.summary("x").is_none());
}

#[test]
fn monitor_operations_feed_learner() {
    let cfg = MonitorConfig {
        report_after: 2,
        threshold_bytes: u64::MAX,
        ..Default::default()
    };
    let metrics = ScriptedMetrics::new([Some(100), Some(200), Some(300), None]);
    let monitor = MemoryMonitor::new(metrics, cfg).unwrap();

    let token = monitor.begin_operation("import");
    assert_eq!(monitor.sample_operation(token), Some(200));
    assert!(monitor.summary("import").is_none());

    let record = monitor.end_operation(token).unwrap();
    assert_eq!(record.last_sample_bytes, Some(300));

    let summary = monitor.summary("import").unwrap();
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.mean_bytes, 200.0);

    // Telemetry gone: nothing is recorded, the token is already ended.
    let token = monitor.begin_operation("import");
    assert_eq!(monitor.operation(token).unwrap().last_sample_bytes, None);
    assert_eq!(monitor.sample_operation(token), None);
    assert_eq!(monitor.with_learner(|l| l.series("import").map(|s| s.len())), Some(3));
}
