//! In-crate fake host used by unit tests.

use std::sync::atomic::{AtomicU64, Ordering};

use reclaim_core::handle::HandleHost;

#[derive(Debug, PartialEq, Eq)]
pub struct Node {
    pub id: u64,
    pub tag: String,
    pub content: String,
    pub listeners: Vec<String>,
}

#[derive(Default)]
pub struct NodeHost {
    next_id: AtomicU64,
    sanitized: AtomicU64,
}

impl NodeHost {
    pub fn constructed(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    pub fn sanitized(&self) -> u64 {
        self.sanitized.load(Ordering::Relaxed)
    }
}

impl HandleHost for NodeHost {
    type Handle = Node;

    fn construct(&self, tag: &str) -> Node {
        Node {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            tag: tag.to_string(),
            content: String::new(),
            listeners: Vec::new(),
        }
    }

    fn sanitize(&self, node: &mut Node) {
        node.content.clear();
        node.listeners.clear();
        self.sanitized.fetch_add(1, Ordering::Relaxed);
    }

    fn tag_of(&self, node: &Node) -> String {
        node.tag.clone()
    }
}
