//! Positional (and optionally keyed) reconciliation of item lists onto
//! container children.
//!
//! `reconcile` matches purely by position: item `i` is rendered onto whatever
//! child sits at index `i`. If item identity does not follow position, the
//! render callback must overwrite *all* prior state of the child, otherwise
//! stale state from a different item leaks through. `reconcile_keyed` avoids
//! that by matching children to items through a key.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use reclaim_core::handle::HandleHost;

use crate::pool::{Origin, ResourcePool};

/// An ordered set of attached children.
pub trait Container {
    type Child;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut Self::Child>;

    /// Append a child at the end.
    fn attach(&mut self, child: Self::Child);

    /// Remove and return the last child.
    fn detach_last(&mut self) -> Option<Self::Child>;
}

impl<H> Container for Vec<H> {
    type Child = H;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn child_mut(&mut self, index: usize) -> Option<&mut H> {
        self.get_mut(index)
    }

    fn attach(&mut self, child: H) {
        self.push(child);
    }

    fn detach_last(&mut self) -> Option<H> {
        self.pop()
    }
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileReport {
    /// Render calls made (always equals the item count).
    pub rendered: usize,
    /// Children that were already attached and got re-rendered.
    pub reused_in_place: usize,
    /// New children taken from the pool.
    pub reused_from_pool: usize,
    /// New children built by the host.
    pub constructed: usize,
    /// Surplus children detached and returned to the pool.
    pub released: usize,
}

impl ReconcileReport {
    fn count(&mut self, origin: Origin) {
        match origin {
            Origin::Reused => self.reused_from_pool += 1,
            Origin::Constructed => self.constructed += 1,
        }
    }
}

/// Maps item lists onto container children, drawing from and returning to a
/// shared [`ResourcePool`].
pub struct ContainerReconciler<S: HandleHost> {
    pool: ResourcePool<S>,
}

impl<S: HandleHost> ContainerReconciler<S> {
    pub fn new(pool: ResourcePool<S>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ResourcePool<S> {
        &self.pool
    }

    /// Align `container` with `items` by position.
    ///
    /// Afterwards the container holds exactly `items.len()` children and
    /// `render` has been called once per item, in index order. Existing
    /// children are reused regardless of their tag; only new children are
    /// acquired under `tag`.
    pub fn reconcile<C, T, R>(
        &self,
        container: &mut C,
        items: &[T],
        tag: &str,
        mut render: R,
    ) -> ReconcileReport
    where
        C: Container<Child = S::Handle>,
        R: FnMut(&mut S::Handle, &T),
    {
        let mut report = ReconcileReport::default();

        for (i, item) in items.iter().enumerate() {
            if i < container.len() {
                report.reused_in_place += 1;
            } else {
                let (handle, origin) = self.pool.acquire_traced(tag);
                report.count(origin);
                container.attach(handle);
            }
            if let Some(child) = container.child_mut(i) {
                render(child, item);
                report.rendered += 1;
            }
        }

        while container.len() > items.len() {
            match container.detach_last() {
                Some(surplus) => {
                    self.pool.release(surplus);
                    report.released += 1;
                }
                None => break,
            }
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            tag,
            rendered = report.rendered,
            constructed = report.constructed,
            released = report.released,
            "reconciled"
        );
        report
    }

    /// Align `container` with `items` by key.
    ///
    /// A child whose key matches an item is reused for that item wherever it
    /// sat before. Children with no matching item (and duplicate keys) are
    /// released. The resulting order follows `items`.
    pub fn reconcile_keyed<K, T, KF, R>(
        &self,
        container: &mut Vec<(K, S::Handle)>,
        items: &[T],
        tag: &str,
        mut key: KF,
        mut render: R,
    ) -> ReconcileReport
    where
        K: Eq + Hash,
        KF: FnMut(&T) -> K,
        R: FnMut(&mut S::Handle, &T),
    {
        let mut report = ReconcileReport::default();

        let mut existing: HashMap<K, S::Handle> = HashMap::with_capacity(container.len());
        let mut displaced = Vec::new();
        for (k, handle) in container.drain(..) {
            if let Some(prev) = existing.insert(k, handle) {
                displaced.push(prev);
            }
        }

        let mut next = Vec::with_capacity(items.len());
        for item in items {
            let k = key(item);
            let mut handle = match existing.remove(&k) {
                Some(handle) => {
                    report.reused_in_place += 1;
                    handle
                }
                None => {
                    let (handle, origin) = self.pool.acquire_traced(tag);
                    report.count(origin);
                    handle
                }
            };
            render(&mut handle, item);
            report.rendered += 1;
            next.push((k, handle));
        }

        for surplus in displaced.into_iter().chain(existing.into_values()) {
            self.pool.release(surplus);
            report.released += 1;
        }

        *container = next;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Node, NodeHost};

    fn render(node: &mut Node, item: &&str) {
        node.content = item.to_string();
    }

    #[test]
    fn grows_and_renders_in_order() {
        let reconciler = ContainerReconciler::new(ResourcePool::new(NodeHost::default()));
        let mut container: Vec<Node> = Vec::new();
        let mut seen = Vec::new();

        let report = reconciler.reconcile(&mut container, &["a", "b", "c"], "li", |n, item| {
            seen.push(*item);
            render(n, item);
        });

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(container.len(), 3);
        assert_eq!(report.constructed, 3);
        assert_eq!(report.rendered, 3);
        let contents: Vec<&str> = container.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn shrinking_releases_surplus_to_pool() {
        let reconciler = ContainerReconciler::new(ResourcePool::new(NodeHost::default()));
        let mut container: Vec<Node> = Vec::new();
        reconciler.reconcile(&mut container, &["a", "b", "c", "d"], "li", render);

        let before = reconciler.pool().available("li");
        let report = reconciler.reconcile(&mut container, &["x"], "li", render);

        assert_eq!(container.len(), 1);
        assert_eq!(container[0].content, "x");
        assert_eq!(report.reused_in_place, 1);
        assert_eq!(report.released, 3);
        assert_eq!(reconciler.pool().available("li"), before + 3);
    }

    #[test]
    fn positional_reuse_keeps_handle_at_index() {
        let reconciler = ContainerReconciler::new(ResourcePool::new(NodeHost::default()));
        let mut container: Vec<Node> = Vec::new();
        reconciler.reconcile(&mut container, &["a", "b"], "li", render);
        let first_id = container[0].id;

        // Reordered items land on whatever sits at each position.
        reconciler.reconcile(&mut container, &["b", "a"], "li", render);
        assert_eq!(container[0].id, first_id);
        assert_eq!(container[0].content, "b");
    }

    #[test]
    fn keyed_reuse_follows_item_identity() {
        let reconciler = ContainerReconciler::new(ResourcePool::new(NodeHost::default()));
        let mut container: Vec<(String, Node)> = Vec::new();
        let key = |item: &&str| item.to_string();

        reconciler.reconcile_keyed(&mut container, &["a", "b", "c"], "li", key, render);
        let id_of = |c: &Vec<(String, Node)>, k: &str| {
            c.iter().find(|(key, _)| key == k).map(|(_, n)| n.id)
        };
        let a_id = id_of(&container, "a");

        let report =
            reconciler.reconcile_keyed(&mut container, &["c", "a"], "li", key, render);

        assert_eq!(report.reused_in_place, 2);
        assert_eq!(report.released, 1);
        assert_eq!(container.len(), 2);
        assert_eq!(container[1].0, "a");
        assert_eq!(id_of(&container, "a"), a_id);
        assert_eq!(reconciler.pool().available("li"), 1);
    }
}
