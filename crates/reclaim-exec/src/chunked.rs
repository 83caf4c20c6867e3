//! Chunked processing that never blocks the scheduler for a whole dataset.
//!
//! Items are handed to the callback one fixed-size slice at a time. After each
//! slice the monitor samples memory (requesting a collection when over the
//! threshold) and the task yields, so chunk `k + 1` only starts after chunk
//! `k`'s side effects and an interleaved scheduler turn.

use serde::Serialize;

use crate::monitor::MemoryMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChunkReport {
    /// Callback invocations.
    pub chunks: usize,
    pub items: usize,
    /// Slices after which the heap was over the threshold.
    pub collections_requested: usize,
    /// Highest heap reading seen between slices.
    pub peak_sample_bytes: Option<u64>,
}

impl MemoryMonitor {
    /// [`process_in_chunks_with`](Self::process_in_chunks_with) using the
    /// configured `chunk_size`.
    pub async fn process_in_chunks<T, E, F>(&self, items: &[T], f: F) -> Result<ChunkReport, E>
    where
        F: FnMut(&[T]) -> Result<(), E>,
    {
        let chunk_size = self.config().chunk_size;
        self.process_in_chunks_with(items, chunk_size, f).await
    }

    /// Call `f` on consecutive `chunk_size` slices of `items` (a size of 0 is
    /// treated as 1). The first `Err` is returned as-is and the remaining
    /// slices are skipped.
    pub async fn process_in_chunks_with<T, E, F>(
        &self,
        items: &[T],
        chunk_size: usize,
        mut f: F,
    ) -> Result<ChunkReport, E>
    where
        F: FnMut(&[T]) -> Result<(), E>,
    {
        let mut report = ChunkReport::default();

        for slice in items.chunks(chunk_size.max(1)) {
            if let Err(e) = f(slice) {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    chunk = report.chunks,
                    processed = report.items,
                    total = items.len(),
                    "chunk callback failed; aborting remaining chunks"
                );
                return Err(e);
            }
            report.chunks += 1;
            report.items += slice.len();

            let (sample, collected) = self.check_threshold();
            if collected {
                report.collections_requested += 1;
            }
            if let Some(bytes) = sample {
                report.peak_sample_bytes =
                    Some(report.peak_sample_bytes.map_or(bytes, |peak| peak.max(bytes)));
            }

            tokio::task::yield_now().await;
        }

        Ok(report)
    }
}
