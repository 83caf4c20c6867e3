//! sysinfo-based implementation of the PlatformMetrics trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sysinfo::{Pid, ProcessesToUpdate, System};

use reclaim_core::metrics::PlatformMetrics;

/// Reads this process's resident memory through `sysinfo`.
///
/// Rust has no collector to poke, so `request_collection` only counts and
/// logs the hint.
pub struct SysinfoMetrics {
    system: Mutex<System>,
    pid: Option<Pid>,
    hints: AtomicU64,
}

impl SysinfoMetrics {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            tracing::warn!("current pid unavailable; heap readings disabled");
        }
        Self {
            system: Mutex::new(System::new()),
            pid,
            hints: AtomicU64::new(0),
        }
    }

    pub fn hints(&self) -> u64 {
        self.hints.load(Ordering::Relaxed)
    }
}

impl Default for SysinfoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformMetrics for SysinfoMetrics {
    fn current_heap_usage(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).map(|p| p.memory())
    }

    fn request_collection(&self) {
        let n = self.hints.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(hints = n, "collection hint");
    }
}
