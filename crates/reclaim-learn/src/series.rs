//! Ordered byte-sample history for one label.

use std::collections::VecDeque;

use reclaim_core::config::Retention;

/// Arithmetic mean of `samples` in bytes. An empty series averages to `0.0`.
pub fn average(samples: &[u64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u128 = samples.iter().map(|&s| s as u128).sum();
    sum as f64 / samples.len() as f64
}

/// Samples in insertion (= temporal) order. Never deduplicated.
#[derive(Debug, Clone, Default)]
pub struct SampleSeries {
    samples: VecDeque<u64>,
    retention: Retention,
    // Running sum of the retained samples, so `mean` is O(1).
    sum: u128,
}

impl SampleSeries {
    pub fn new(retention: Retention) -> Self {
        let samples = match retention {
            Retention::Window(n) => VecDeque::with_capacity(n),
            Retention::Unbounded => VecDeque::new(),
        };
        Self {
            samples,
            retention,
            sum: 0,
        }
    }

    /// Append a sample, evicting the oldest one if the window is full.
    pub fn push(&mut self, bytes: u64) {
        if let Retention::Window(cap) = self.retention {
            while self.samples.len() >= cap.max(1) {
                match self.samples.pop_front() {
                    Some(evicted) => self.sum -= evicted as u128,
                    None => break,
                }
            }
        }
        self.samples.push_back(bytes);
        self.sum += bytes as u128;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum as f64 / self.samples.len() as f64
        }
    }

    pub fn min(&self) -> Option<u64> {
        self.samples.iter().copied().min()
    }

    pub fn max(&self) -> Option<u64> {
        self.samples.iter().copied().max()
    }

    pub fn last(&self) -> Option<u64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().copied()
    }

    /// Copy of the retained samples, oldest first.
    pub fn to_vec(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }
}
