//! Synthetic workload that drives every reclaim subsystem end to end.

use std::convert::Infallible;
use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use reclaim_core::handle::HandleHost;
use reclaim_exec::{
    teardown, AsyncResourceRegistry, ChunkReport, MemoryMonitor, MonitorStats, RegistryStats,
};
use reclaim_learn::PatternSummary;
use reclaim_mem::{ContainerReconciler, PoolStats, ReconcileReport, ResourcePool};

/// A stand-in for a UI element: text content plus attached listeners.
#[derive(Debug)]
pub struct Widget {
    pub id: u64,
    pub tag: String,
    pub text: String,
    pub listeners: Vec<String>,
}

#[derive(Default)]
pub struct WidgetHost {
    next_id: AtomicU64,
}

impl HandleHost for WidgetHost {
    type Handle = Widget;

    fn construct(&self, tag: &str) -> Widget {
        Widget {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            tag: tag.to_string(),
            text: String::new(),
            listeners: Vec::new(),
        }
    }

    fn sanitize(&self, widget: &mut Widget) {
        widget.text.clear();
        widget.listeners.clear();
    }

    fn tag_of(&self, widget: &Widget) -> String {
        widget.tag.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub rounds: usize,
    /// Upper bound on rendered list length per round.
    pub items: usize,
    /// Every n-th bound fetch fails (0 disables failures).
    pub fail_every: usize,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub rounds: usize,
    /// Bound fetches whose task returned `Ok`.
    pub fetches_ok: usize,
    pub fetches_failed: usize,
    pub reconcile: ReconcileReport,
    pub pool: PoolStats,
    pub registry: RegistryStats,
    pub chunks: ChunkReport,
    pub monitor: MonitorStats,
    pub patterns: Vec<PatternSummary>,
}

fn accumulate(total: &mut ReconcileReport, r: ReconcileReport) {
    total.rendered += r.rendered;
    total.reused_in_place += r.reused_in_place;
    total.reused_from_pool += r.reused_from_pool;
    total.constructed += r.constructed;
    total.released += r.released;
}

pub async fn run(
    monitor: &MemoryMonitor,
    cfg: SimulationConfig,
) -> Result<SimulationReport, Box<dyn Error>> {
    let pool = ResourcePool::new(WidgetHost::default());
    let reconciler = ContainerReconciler::new(pool.clone());
    let registry = AsyncResourceRegistry::new(pool.clone());
    registry.set_observer(|event| tracing::debug!(?event, "registry"));

    let mut container: Vec<Widget> = Vec::new();
    let mut totals = ReconcileReport::default();
    let mut fetches = Vec::with_capacity(cfg.rounds);

    for round in 0..cfg.rounds {
        let op = monitor.begin_operation("render");

        let len = 1 + (round * 7) % cfg.items.max(1);
        let rows: Vec<String> = (0..len).map(|i| format!("row {round}.{i}")).collect();
        let report = reconciler.reconcile(&mut container, &rows, "row", |w, row| {
            w.text.clone_from(row);
        });
        accumulate(&mut totals, report);
        monitor.sample_operation(op);

        let mut tooltip = pool.acquire("tooltip");
        tooltip.listeners.push("hover".into());
        let fail = cfg.fail_every > 0 && round % cfg.fail_every == 0;
        let (_, join) = registry.bind_labeled(
            "tooltip-fetch",
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                if fail {
                    Err(format!("fetch {round} failed"))
                } else {
                    Ok(round)
                }
            },
            tooltip,
            teardown(|w: &mut Widget| {
                w.listeners.retain(|l| l != "hover");
                Ok(())
            }),
        );
        fetches.push(join);

        monitor.end_operation(op);
    }

    let (mut fetches_ok, mut fetches_failed) = (0, 0);
    for fetch in fetches {
        match fetch.await? {
            Ok(_) => fetches_ok += 1,
            Err(error) => {
                tracing::debug!(%error, "fetch failed");
                fetches_failed += 1;
            }
        }
    }
    registry.cleanup_all();

    let data: Vec<u64> = (0..(cfg.items as u64) * 100).collect();
    let mut checksum = 0u64;
    let chunks = monitor
        .process_in_chunks(&data, |slice| {
            checksum = checksum.wrapping_add(slice.iter().sum::<u64>());
            Ok::<_, Infallible>(())
        })
        .await?;
    tracing::debug!(checksum, "chunked pass done");

    Ok(SimulationReport {
        rounds: cfg.rounds,
        fetches_ok,
        fetches_failed,
        reconcile: totals,
        pool: pool.stats(),
        registry: registry.stats(),
        chunks,
        monitor: monitor.stats(),
        patterns: monitor.summaries(),
    })
}
