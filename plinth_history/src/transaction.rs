// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transactions: many mutations recorded as one undo step.
//!
//! A transaction snapshots each node the first time it is about to change and remembers
//! which nodes it created. On commit the final state of the same set is captured, so the
//! whole transaction reverses and replays as a single [`Command`].
//!
//! Sibling order is recorded per parent next to the node snapshots. Restoring nodes one by
//! one at saved indices is only approximate once several siblings moved, so each restore
//! ends by putting the recorded parents' children back in their recorded order.

use plinth_scene::{NodeId, NodePatch, NodeTree, Scene, SceneError};

use crate::command::{Command, replace_logged};

/// A node's subtree and its place in the tree.
#[derive(Clone, Debug, PartialEq)]
struct Snapshot {
    tree: NodeTree,
    parent: Option<NodeId>,
    index: usize,
}

impl Snapshot {
    /// Capture `id`, leaving out the `skip` ids both from its subtree and from the
    /// siblings counted for its index.
    fn capture(scene: &Scene, id: &NodeId, skip: &[NodeId]) -> Option<Self> {
        let node = scene.get_node_by_id(id)?;
        let parent = node.parent();
        let index = match parent {
            Some(p) => p
                .children()
                .take_while(|c| c.id() != id)
                .filter(|c| !skip.contains(c.id()))
                .count(),
            None => node.index_in_parent(),
        };
        let mut tree = scene.snapshot_tree(id)?;
        prune(&mut tree.children, |c| skip.contains(&c.node.id));
        Some(Self {
            tree,
            parent: parent.map(|p| p.id().clone()),
            index,
        })
    }
}

type Captured = Vec<(NodeId, Option<Snapshot>)>;

/// Child order of a parent, by id.
type Orders = Vec<(NodeId, Vec<NodeId>)>;

/// State recorded on commit, replayed on redo.
#[derive(Clone, Debug)]
struct Sealed {
    nodes: Captured,
    orders: Orders,
}

/// Bring `id` back to `snapshot`; `None` means the node should not exist.
fn restore(scene: &mut Scene, id: &NodeId, snapshot: Option<&Snapshot>) {
    let Some(snapshot) = snapshot else {
        if scene.delete_node(id) {
            tracing::trace!(%id, "removed");
        }
        return;
    };
    if scene.contains(id) {
        let moved = scene.parent_id(id) != snapshot.parent
            || scene.index_in_parent(id) != Some(snapshot.index);
        if moved
            && let Err(error) = scene.reparent(id, snapshot.parent.as_ref(), Some(snapshot.index))
        {
            // The saved data belongs to the saved parent's frame; leave it alone.
            tracing::warn!(%id, %error, "could not restore node position");
            return;
        }
        replace_logged(scene, snapshot.tree.node.clone());
        return;
    }
    // Descendants that still exist were restored on their own; keep them out of the
    // recreated subtree so ids stay unique.
    let mut tree = snapshot.tree.clone();
    prune(&mut tree.children, |c| scene.contains(&c.node.id));
    if let Err(error) = scene.create_tree(&tree, snapshot.parent.as_ref(), Some(snapshot.index)) {
        tracing::warn!(%id, %error, "could not recreate node");
    }
}

fn prune(children: &mut Vec<NodeTree>, remove: impl Fn(&NodeTree) -> bool + Copy) {
    children.retain(|c| !remove(c));
    for child in children {
        prune(&mut child.children, remove);
    }
}

/// Put the children of `parent` in `order`. Children missing from `order` keep their
/// relative order after the listed ones; listed ids that are not children are skipped.
fn reorder(scene: &mut Scene, parent: &NodeId, order: &[NodeId]) {
    let Some(current) = scene.get_node_by_id(parent).map(|p| p.child_ids()) else {
        return;
    };
    let mut desired: Vec<NodeId> = order
        .iter()
        .filter(|id| current.contains(id))
        .cloned()
        .collect();
    desired.extend(current.iter().filter(|id| !order.contains(id)).cloned());
    if desired != current
        && let Err(error) = scene.set_child_order(parent, &desired)
    {
        tracing::warn!(%parent, %error, "could not restore child order");
    }
}

/// A group of mutations that undo and redo together.
///
/// Mutate through [`Transaction::update`], [`Transaction::create`] and
/// [`Transaction::delete`], or mutate the scene directly after calling
/// [`Transaction::capture_snapshot`] / [`Transaction::track_created`] for each affected
/// node. Transient previews that must never reach history should simply not be tracked.
#[derive(Debug)]
pub struct Transaction {
    label: String,
    before: Captured,
    before_orders: Orders,
    created: Vec<NodeId>,
    after: Option<Sealed>,
}

impl Transaction {
    /// Start an empty transaction.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            before: Vec::new(),
            before_orders: Vec::new(),
            created: Vec::new(),
            after: None,
        }
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.created.is_empty()
    }

    fn owns(&self, scene: &Scene, id: &NodeId) -> bool {
        if self.created.contains(id) {
            return true;
        }
        let mut current = scene.get_node_by_id(id).and_then(|n| n.parent());
        while let Some(node) = current {
            if self.created.contains(node.id()) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Record the current state of `id` unless it is already recorded.
    ///
    /// The first capture wins. Nodes created inside this transaction (or below one) need no
    /// snapshot since undo removes them anyway. Missing ids are recorded as absent.
    pub fn capture_snapshot(&mut self, scene: &Scene, id: &NodeId) {
        if self.before.iter().any(|(seen, _)| seen == id) || self.owns(scene, id) {
            return;
        }
        // Created nodes are gone by the time this snapshot is restored, so they are
        // neither part of its subtree nor counted toward its index.
        let snapshot = Snapshot::capture(scene, id, &self.created);
        if let Some(parent) = snapshot.as_ref().and_then(|s| s.parent.as_ref())
            && !self.before_orders.iter().any(|(p, _)| p == parent)
        {
            let order = scene
                .get_node_by_id(parent)
                .map(|p| p.child_ids())
                .unwrap_or_default()
                .into_iter()
                .filter(|c| !self.created.contains(c))
                .collect();
            self.before_orders.push((parent.clone(), order));
        }
        self.before.push((id.clone(), snapshot));
    }

    /// Record that `id` was created inside this transaction.
    pub fn track_created(&mut self, id: NodeId) {
        if !self.created.contains(&id) {
            self.created.push(id);
        }
    }

    /// Snapshot, then update.
    pub fn update(&mut self, scene: &mut Scene, id: &NodeId, patch: &NodePatch) -> bool {
        self.capture_snapshot(scene, id);
        scene.update_node(id, patch)
    }

    /// Create a subtree and track its root.
    pub fn create(
        &mut self,
        scene: &mut Scene,
        tree: &NodeTree,
        parent: Option<&NodeId>,
        index: Option<usize>,
    ) -> Result<NodeId, SceneError> {
        let id = scene.create_tree(tree, parent, index)?;
        self.track_created(id.clone());
        Ok(id)
    }

    /// Snapshot, then delete.
    pub fn delete(&mut self, scene: &mut Scene, id: &NodeId) -> bool {
        self.capture_snapshot(scene, id);
        scene.delete_node(id)
    }

    /// Record the state every tracked node ended up in. Called on commit.
    pub fn capture_final_state(&mut self, scene: &Scene) {
        let nodes: Captured = self
            .created
            .iter()
            .chain(self.before.iter().map(|(id, _)| id))
            .map(|id| (id.clone(), Snapshot::capture(scene, id, &[])))
            .collect();
        let mut orders: Orders = Vec::new();
        let parents = nodes
            .iter()
            .filter_map(|(_, s)| s.as_ref()?.parent.as_ref())
            .chain(self.before_orders.iter().map(|(p, _)| p));
        for parent in parents {
            if orders.iter().any(|(p, _)| p == parent) {
                continue;
            }
            if let Some(p) = scene.get_node_by_id(parent) {
                orders.push((parent.clone(), p.child_ids()));
            }
        }
        self.after = Some(Sealed { nodes, orders });
    }

    fn delete_created(&self, scene: &mut Scene) {
        for id in self.created.iter().rev() {
            if scene.delete_node(id) {
                tracing::trace!(%id, "created node removed");
            }
        }
    }

    /// Put every tracked node back the way it was before the transaction.
    pub fn rollback(&self, scene: &mut Scene) {
        self.delete_created(scene);
        for (id, snapshot) in self.before.iter().rev() {
            restore(scene, id, snapshot.as_ref());
        }
        // A snapshot may have been taken of a subtree a created node was later moved into.
        self.delete_created(scene);
        for (parent, order) in &self.before_orders {
            reorder(scene, parent, order);
        }
    }

    fn replay(&self, scene: &mut Scene, sealed: &Sealed) {
        // Created roots first so snapshotted nodes can land under them.
        let created = sealed.nodes.iter().filter(|(id, _)| self.created.contains(id));
        let touched = sealed.nodes.iter().filter(|(id, _)| !self.created.contains(id));
        for (id, snapshot) in created.chain(touched) {
            restore(scene, id, snapshot.as_ref());
        }
        for (parent, order) in &sealed.orders {
            reorder(scene, parent, order);
        }
    }
}

impl Command for Transaction {
    fn label(&self) -> &str {
        &self.label
    }

    /// The mutations already happened; this only seals the final state, or replays it
    /// on redo.
    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        match self.after.take() {
            None => self.capture_final_state(scene),
            Some(sealed) => {
                self.replay(scene, &sealed);
                self.after = Some(sealed);
            }
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        self.rollback(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Size};
    use plinth_scene::{Node, NodeKind};

    fn house() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let _ = scene.create(Node::new(NodeKind::Building {}), None).unwrap();
        let level = scene.create(Node::new(NodeKind::level(0.0)), None).unwrap();
        (scene, level)
    }

    fn chair(x: f64) -> Node {
        Node::new(NodeKind::item("chair", Point::new(x, 0.0), Size::new(1.0, 1.0)))
    }

    #[test]
    fn drag_of_many_updates_reverses_to_the_first_snapshot() {
        let (mut scene, level) = house();
        let a = scene.create(chair(0.0), Some(&level)).unwrap();
        let before = scene.to_document();
        let mut tx = Transaction::new("Drag");
        for step in 1..=20 {
            let _ = tx.update(
                &mut scene,
                &a,
                &NodePatch::new().position(Point::new(f64::from(step), 0.0)),
            );
        }
        tx.execute(&mut scene).unwrap();
        let after = scene.to_document();
        tx.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
        tx.redo(&mut scene).unwrap();
        assert_eq!(scene.to_document(), after);
    }

    #[test]
    fn created_and_deleted_nodes_round_trip() {
        let (mut scene, level) = house();
        let a = scene.create(chair(0.0), Some(&level)).unwrap();
        let b = scene.create(chair(2.0), Some(&level)).unwrap();
        let before = scene.to_document();

        let mut tx = Transaction::new("Replace");
        let g = tx
            .create(
                &mut scene,
                &NodeTree::new(Node::new(NodeKind::group(Point::ORIGIN, 0.0))),
                Some(&level),
                Some(0),
            )
            .unwrap();
        // Children of a created node need no snapshot of their own.
        let inner = tx
            .create(&mut scene, &NodeTree::new(chair(5.0)), Some(&g), None)
            .unwrap();
        let _ = tx.update(&mut scene, &inner, &NodePatch::new().opacity(40));
        assert!(tx.before.is_empty());
        assert!(tx.delete(&mut scene, &a));
        tx.capture_snapshot(&scene, &b);
        scene.reparent(&b, Some(&g), None).unwrap();
        tx.execute(&mut scene).unwrap();
        let after = scene.to_document();

        tx.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
        tx.redo(&mut scene).unwrap();
        assert_eq!(scene.to_document(), after);
        tx.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
    }

    #[test]
    fn deleting_a_parent_then_a_snapshotted_child_restores_both() {
        let (mut scene, level) = house();
        let g = scene
            .create(Node::new(NodeKind::group(Point::new(1.0, 1.0), 0.0)), Some(&level))
            .unwrap();
        let inner = scene.create(chair(0.0), Some(&g)).unwrap();
        let before = scene.to_document();

        let mut tx = Transaction::new("Clear");
        let _ = tx.update(&mut scene, &inner, &NodePatch::new().visible(false));
        assert!(tx.delete(&mut scene, &g));
        tx.execute(&mut scene).unwrap();
        tx.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
    }

    fn group_with_chair(scene: &mut Scene, level: &NodeId) -> (NodeId, NodeId) {
        let g = scene
            .create(Node::new(NodeKind::group(Point::new(1.0, 1.0), 0.0)), Some(level))
            .unwrap();
        let _ = scene.create(chair(0.0), Some(&g)).unwrap();
        let other = scene.create(chair(4.0), Some(level)).unwrap();
        (g, other)
    }

    #[test]
    fn node_created_inside_a_deleted_group_stays_gone_on_undo() {
        let (mut scene, level) = house();
        let (g, _) = group_with_chair(&mut scene, &level);
        let before = scene.to_document();

        let mut tx = Transaction::new("Clear");
        let x = tx
            .create(&mut scene, &NodeTree::new(chair(2.0)), Some(&g), Some(0))
            .unwrap();
        assert!(tx.delete(&mut scene, &g));
        tx.execute(&mut scene).unwrap();
        let after = scene.to_document();

        tx.undo(&mut scene);
        assert!(!scene.contains(&x));
        assert_eq!(scene.to_document(), before);
        tx.redo(&mut scene).unwrap();
        assert_eq!(scene.to_document(), after);
    }

    #[test]
    fn node_tracked_after_its_parent_was_snapshotted_is_removed_on_rollback() {
        let (mut scene, level) = house();
        let (g, _) = group_with_chair(&mut scene, &level);
        let before = scene.to_document();

        // Direct mutation: the new chair exists before it is tracked, so the group's
        // snapshot still holds it.
        let mut tx = Transaction::new("Drop");
        let x = scene.create(chair(2.0), Some(&g)).unwrap();
        tx.capture_snapshot(&scene, &g);
        tx.track_created(x.clone());
        assert!(scene.delete_node(&g));
        tx.rollback(&mut scene);
        assert!(!scene.contains(&x));
        assert_eq!(scene.to_document(), before);
        scene.validate().unwrap();
    }

    #[test]
    fn redo_keeps_the_committed_sibling_order() {
        let (mut scene, level) = house();
        let _ = group_with_chair(&mut scene, &level);
        let _ = scene.create(chair(8.0), Some(&level)).unwrap();
        let before = scene.to_document();

        let mut tx = Transaction::new("Place");
        let x = tx
            .create(&mut scene, &NodeTree::new(chair(10.0)), Some(&level), Some(2))
            .unwrap();
        let y = tx
            .create(&mut scene, &NodeTree::new(chair(12.0)), Some(&level), Some(0))
            .unwrap();
        tx.execute(&mut scene).unwrap();
        let after = scene.to_document();
        let order = scene.get_node_by_id(&level).unwrap().child_ids();
        assert_eq!(order[0], y);
        assert_eq!(order[3], x);

        tx.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
        tx.redo(&mut scene).unwrap();
        assert_eq!(scene.to_document(), after);
    }

    #[test]
    fn rollback_restores_order_after_several_siblings_move() {
        let (mut scene, level) = house();
        let ids: Vec<NodeId> = (0..4)
            .map(|i| scene.create(chair(f64::from(i) * 2.0), Some(&level)).unwrap())
            .collect();
        let before = scene.to_document();

        let mut tx = Transaction::new("Shuffle");
        for id in [&ids[3], &ids[0], &ids[2]] {
            tx.capture_snapshot(&scene, id);
        }
        let shuffled = vec![ids[3].clone(), ids[2].clone(), ids[1].clone(), ids[0].clone()];
        scene.set_child_order(&level, &shuffled).unwrap();
        tx.execute(&mut scene).unwrap();

        tx.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
        tx.redo(&mut scene).unwrap();
        assert_eq!(scene.get_node_by_id(&level).unwrap().child_ids(), shuffled);
    }

    #[test]
    fn first_snapshot_wins() {
        let (mut scene, level) = house();
        let a = scene.create(chair(0.0), Some(&level)).unwrap();
        let mut tx = Transaction::new("Nudge");
        tx.capture_snapshot(&scene, &a);
        scene.update_node(&a, &NodePatch::new().position(Point::new(3.0, 0.0)));
        tx.capture_snapshot(&scene, &a);
        tx.rollback(&mut scene);
        assert_eq!(scene.node(&a).unwrap().kind.position(), Some(Point::ORIGIN));
    }
}
