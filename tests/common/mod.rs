//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use reclaim_core::handle::HandleHost;
use reclaim_core::metrics::PlatformMetrics;

#[derive(Debug, PartialEq, Eq)]
pub struct Element {
    pub id: u64,
    pub tag: String,
    pub text: String,
    pub listeners: Vec<&'static str>,
}

/// Host that numbers every element it builds and counts sanitize calls per
/// element id.
#[derive(Default)]
pub struct CountingHost {
    next_id: AtomicU64,
    sanitized: Mutex<HashMap<u64, usize>>,
}

impl CountingHost {
    pub fn constructed(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn sanitize_count(&self, id: u64) -> usize {
        self.sanitized.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn total_sanitized(&self) -> usize {
        self.sanitized.lock().unwrap().values().sum()
    }
}

impl HandleHost for CountingHost {
    type Handle = Element;

    fn construct(&self, tag: &str) -> Element {
        Element {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tag: tag.to_string(),
            text: String::new(),
            listeners: Vec::new(),
        }
    }

    fn sanitize(&self, element: &mut Element) {
        element.text.clear();
        element.listeners.clear();
        *self.sanitized.lock().unwrap().entry(element.id).or_insert(0) += 1;
    }

    fn tag_of(&self, element: &Element) -> String {
        element.tag.clone()
    }
}

/// Telemetry that replays a fixed script of readings (repeating the last one
/// once exhausted) and counts collection requests.
pub struct ScriptedMetrics {
    script: Mutex<VecDeque<Option<u64>>>,
    last: Mutex<Option<u64>>,
    collections: AtomicUsize,
}

impl ScriptedMetrics {
    pub fn new(script: impl IntoIterator<Item = Option<u64>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            collections: AtomicUsize::new(0),
        }
    }

    pub fn constant(bytes: u64) -> Self {
        Self::new([Some(bytes)])
    }

    pub fn collections(&self) -> usize {
        self.collections.load(Ordering::SeqCst)
    }
}

impl PlatformMetrics for ScriptedMetrics {
    fn current_heap_usage(&self) -> Option<u64> {
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *last = next;
        }
        *last
    }

    fn request_collection(&self) {
        self.collections.fetch_add(1, Ordering::SeqCst);
    }
}
