//! Periodic heap sampler with threshold-triggered collection hints.
//!
//! While running, every tick samples [`PlatformMetrics`]. Over the threshold
//! it requests a collection; if the caller's idle predicate also holds, it
//! schedules a deferred compaction (a second, delayed collection request).
//! Only one deferred compaction is outstanding at a time: the pending flag
//! clears once the delayed request has run.
//!
//! The monitor also owns in-flight [`OperationRecord`]s and feeds their
//! samples to a [`UsagePatternLearner`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use reclaim_core::config::MonitorConfig;
use reclaim_core::error::Result;
use reclaim_core::id::OperationToken;
use reclaim_core::metrics::PlatformMetrics;
use reclaim_core::time::now_ms;
use reclaim_learn::{PatternSummary, UsagePatternLearner};

use crate::lifecycle::Lifecycle;

type IdlePredicate = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Stopped,
    Running,
}

/// What a tick decided about deferred compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compaction {
    Scheduled,
    /// A deferred compaction is already waiting to run.
    AlreadyPending,
    NotIdle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TickOutcome {
    /// Telemetry had no reading; nothing happened.
    Unavailable,
    WithinThreshold { sample: u64 },
    /// A collection was requested.
    OverThreshold { sample: u64, compaction: Compaction },
}

/// An in-flight unit of work tracked by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub label: String,
    pub started_at_ms: u64,
    /// `None` until telemetry produced a reading.
    pub last_sample_bytes: Option<u64>,
}

#[derive(Default)]
struct MonitorCounters {
    ticks: AtomicU64,
    unavailable: AtomicU64,
    collections_requested: AtomicU64,
    compactions_scheduled: AtomicU64,
    compactions_run: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MonitorStats {
    pub ticks: u64,
    pub unavailable: u64,
    /// Immediate collection requests (ticks and chunk checks).
    pub collections_requested: u64,
    pub compactions_scheduled: u64,
    /// Deferred compactions that actually ran.
    pub compactions_run: u64,
    pub active_operations: usize,
}

struct MonitorShared {
    metrics: Box<dyn PlatformMetrics>,
    config: MonitorConfig,
    idle: Mutex<IdlePredicate>,
    compaction_pending: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    compaction: Mutex<Option<JoinHandle<()>>>,
    operations: Mutex<HashMap<OperationToken, OperationRecord>>,
    learner: Mutex<UsagePatternLearner>,
    counters: MonitorCounters,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MonitorShared {
    fn is_idle(&self) -> bool {
        let idle = Arc::clone(&*lock(&self.idle));
        idle()
    }

    fn request_collection(&self) {
        self.metrics.request_collection();
        self.counters
            .collections_requested
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Sample once and request a collection if over the threshold.
    /// Returns the sample and whether a collection was requested.
    pub(crate) fn check_threshold(&self) -> (Option<u64>, bool) {
        let sample = self.metrics.current_heap_usage();
        match sample {
            Some(bytes) if bytes > self.config.threshold_bytes => {
                self.request_collection();
                (sample, true)
            }
            _ => (sample, false),
        }
    }

    fn tick(self: &Arc<Self>) -> TickOutcome {
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let Some(sample) = self.metrics.current_heap_usage() else {
            self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::trace!("heap usage unavailable; skipping tick");
            return TickOutcome::Unavailable;
        };

        if sample <= self.config.threshold_bytes {
            return TickOutcome::WithinThreshold { sample };
        }

        self.request_collection();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            sample,
            threshold = self.config.threshold_bytes,
            "heap over threshold; collection requested"
        );

        let compaction = if !self.is_idle() {
            Compaction::NotIdle
        } else if self
            .compaction_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            Compaction::AlreadyPending
        } else {
            self.schedule_compaction();
            Compaction::Scheduled
        };

        TickOutcome::OverThreshold { sample, compaction }
    }

    /// Caller has already set `compaction_pending`.
    fn schedule_compaction(self: &Arc<Self>) {
        self.counters
            .compactions_scheduled
            .fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(self);
        let delay = self.config.compaction_delay();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.metrics.request_collection();
            shared.counters.compactions_run.fetch_add(1, Ordering::Relaxed);
            shared.compaction_pending.store(false, Ordering::Release);
            Lifecycle::CompactionRun {
                delay_ms: delay.as_millis() as u64,
            }
            .emit();
        });
        *lock(&self.compaction) = Some(task);
    }

    fn record(&self, label: &str, bytes: u64) -> Option<PatternSummary> {
        lock(&self.learner).record_sample(label, bytes)
    }
}

/// Process-wide memory sampler. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryMonitor {
    shared: Arc<MonitorShared>,
}

impl fmt::Debug for MemoryMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMonitor")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}

impl MemoryMonitor {
    /// Create a stopped monitor. The idle predicate defaults to "always idle".
    pub fn new<M: PlatformMetrics>(metrics: M, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let learner = UsagePatternLearner::from_config(&config);
        Ok(Self {
            shared: Arc::new(MonitorShared {
                metrics: Box::new(metrics),
                config,
                idle: Mutex::new(Arc::new(|| true)),
                compaction_pending: AtomicBool::new(false),
                timer: Mutex::new(None),
                compaction: Mutex::new(None),
                operations: Mutex::new(HashMap::new()),
                learner: Mutex::new(learner),
                counters: MonitorCounters::default(),
            }),
        })
    }

    /// Builder form of [`set_idle_predicate`](Self::set_idle_predicate).
    pub fn with_idle_predicate<F>(self, idle: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.set_idle_predicate(idle);
        self
    }

    /// Replace the caller-supplied idle predicate.
    pub fn set_idle_predicate<F>(&self, idle: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        *lock(&self.shared.idle) = Arc::new(idle);
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> MonitorState {
        match &*lock(&self.shared.timer) {
            Some(timer) if !timer.is_finished() => MonitorState::Running,
            _ => MonitorState::Stopped,
        }
    }

    /// Start the recurring timer. The first tick fires one interval from now.
    /// Returns false if already running. Must be called within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut timer = lock(&self.shared.timer);
        if matches!(&*timer, Some(t) if !t.is_finished()) {
            return false;
        }

        let period = self.shared.config.interval();
        // The timer must not keep the monitor alive on its own.
        let weak: Weak<MonitorShared> = Arc::downgrade(&self.shared);
        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(shared) => {
                        shared.tick();
                    }
                    None => break,
                }
            }
        }));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            interval_ms = self.shared.config.interval_ms,
            threshold = self.shared.config.threshold_bytes,
            "memory monitor started"
        );
        true
    }

    /// Cancel the timer and any pending deferred compaction, and clear the
    /// pending flag. Returns false if the monitor was not running.
    pub fn stop(&self) -> bool {
        let timer = lock(&self.shared.timer).take();
        if let Some(pending) = lock(&self.shared.compaction).take() {
            pending.abort();
        }
        self.shared.compaction_pending.store(false, Ordering::Release);

        match timer {
            Some(timer) => {
                let was_running = !timer.is_finished();
                timer.abort();
                #[cfg(feature = "tracing")]
                tracing::debug!("memory monitor stopped");
                was_running
            }
            None => false,
        }
    }

    /// Run one sampling step now, exactly as the timer would.
    /// Must be called within a Tokio runtime (compaction is spawned).
    pub fn tick(&self) -> TickOutcome {
        self.shared.tick()
    }

    /// Current heap usage, if the platform can tell.
    pub fn sample(&self) -> Option<u64> {
        self.shared.metrics.current_heap_usage()
    }

    /// Whether a deferred compaction is waiting to run.
    pub fn compaction_pending(&self) -> bool {
        self.shared.compaction_pending.load(Ordering::Acquire)
    }

    /// Start tracking an operation and record its first sample.
    pub fn begin_operation(&self, label: impl Into<String>) -> OperationToken {
        let label = label.into();
        let sample = self.sample();
        if let Some(bytes) = sample {
            self.shared.record(&label, bytes);
        }

        let token = OperationToken::fresh();
        lock(&self.shared.operations).insert(
            token,
            OperationRecord {
                label,
                started_at_ms: now_ms(),
                last_sample_bytes: sample,
            },
        );
        token
    }

    /// Sample memory for a tracked operation and feed it to the learner.
    /// `None` if the token is unknown or telemetry is unavailable.
    pub fn sample_operation(&self, token: OperationToken) -> Option<u64> {
        let bytes = self.sample()?;
        let label = {
            let mut ops = lock(&self.shared.operations);
            let record = ops.get_mut(&token)?;
            record.last_sample_bytes = Some(bytes);
            record.label.clone()
        };
        self.shared.record(&label, bytes);
        Some(bytes)
    }

    /// Take a final sample and stop tracking the operation.
    pub fn end_operation(&self, token: OperationToken) -> Option<OperationRecord> {
        let sample = self.sample();
        let mut record = lock(&self.shared.operations).remove(&token)?;
        if let Some(bytes) = sample {
            record.last_sample_bytes = Some(bytes);
            self.shared.record(&record.label, bytes);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            label = %record.label,
            elapsed_ms = now_ms().saturating_sub(record.started_at_ms),
            "operation ended"
        );
        Some(record)
    }

    pub fn operation(&self, token: OperationToken) -> Option<OperationRecord> {
        lock(&self.shared.operations).get(&token).cloned()
    }

    /// Feed an externally measured sample for `label` to the learner.
    pub fn record_sample(&self, label: &str, bytes: u64) -> Option<PatternSummary> {
        self.shared.record(label, bytes)
    }

    pub fn summary(&self, label: &str) -> Option<PatternSummary> {
        lock(&self.shared.learner).summary(label)
    }

    pub fn summaries(&self) -> Vec<PatternSummary> {
        lock(&self.shared.learner).summaries()
    }

    /// Run `f` against the learner while holding its lock.
    pub fn with_learner<R>(&self, f: impl FnOnce(&UsagePatternLearner) -> R) -> R {
        f(&lock(&self.shared.learner))
    }

    pub fn stats(&self) -> MonitorStats {
        let c = &self.shared.counters;
        MonitorStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            unavailable: c.unavailable.load(Ordering::Relaxed),
            collections_requested: c.collections_requested.load(Ordering::Relaxed),
            compactions_scheduled: c.compactions_scheduled.load(Ordering::Relaxed),
            compactions_run: c.compactions_run.load(Ordering::Relaxed),
            active_operations: lock(&self.shared.operations).len(),
        }
    }

    pub(crate) fn check_threshold(&self) -> (Option<u64>, bool) {
        self.shared.check_threshold()
    }
}
