// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plinth History: reversible edits for a [`plinth_scene::Scene`].
//!
//! Every user-visible edit is a [`Command`]: it runs once, records exactly the prior state
//! it needs, and can then be undone and redone any number of times. [`History`] keeps a
//! bounded undo stack and a redo stack that any new command clears.
//!
//! Commands provided here:
//! - [`AddNode`], [`UpdateNode`], [`DeleteNode`] and [`BatchDelete`] for single nodes.
//! - [`MoveNode`], [`GroupNodes`] and [`UngroupNodes`], which keep absolute placement
//!   when nodes cross a (possibly rotated) group boundary.
//! - [`ReorderLevels`] for a building's level stack.
//!
//! Continuous gestures such as a drag go through a [`Transaction`]: the first snapshot of
//! each node is kept, intermediate states are dropped, and the whole gesture becomes one
//! step on commit.
//!
//! # Example
//!
//! ```rust
//! use kurbo::{Point, Size};
//! use plinth_history::{AddNode, History, UpdateNode};
//! use plinth_scene::{Node, NodeKind, NodePatch, Scene};
//!
//! let mut scene = Scene::new();
//! scene.create(Node::new(NodeKind::Building {}), None).unwrap();
//! let level = scene.create(Node::new(NodeKind::level(0.0)), None).unwrap();
//! let mut history = History::for_scene(&scene);
//!
//! let add = AddNode::new(
//!     Node::new(NodeKind::item("table", Point::new(1.0, 1.0), Size::new(2.0, 1.0))),
//!     Some(level),
//! );
//! let table = add.id().clone();
//! history.execute(&mut scene, add).unwrap();
//! history
//!     .execute(&mut scene, UpdateNode::new(table.clone(), NodePatch::new().rotation(0.5)))
//!     .unwrap();
//!
//! history.undo(&mut scene);
//! assert_eq!(scene.node(&table).unwrap().kind.rotation(), Some(0.0));
//! history.undo(&mut scene);
//! assert!(!scene.contains(&table));
//! history.redo(&mut scene);
//! assert!(scene.contains(&table));
//! ```

mod command;
mod history;
mod structure;
mod transaction;

pub use command::{AddNode, BatchDelete, Command, DeleteNode, ReorderLevels, UpdateNode};
pub use history::{DEFAULT_HISTORY_LIMIT, History};
pub use structure::{GroupNodes, MoveNode, UngroupNodes};
pub use transaction::Transaction;

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;
    use kurbo::{Point, Size};
    use plinth_scene::{
        Node, NodeId, NodeKind, NodePatch, NodeTree, Scene, SceneDocument, SceneError,
    };
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn house() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let _ = scene.create(Node::new(NodeKind::Building {}), None).unwrap();
        let level = scene.create(Node::new(NodeKind::level(0.0)), None).unwrap();
        (scene, level)
    }

    /// A building with two levels; the edits below spread over both.
    fn street() -> (Scene, NodeId, Vec<NodeId>) {
        let mut scene = Scene::new();
        let building = scene.create(Node::new(NodeKind::Building {}), None).unwrap();
        let levels = (0..2)
            .map(|i| {
                scene
                    .create(Node::new(NodeKind::level(f64::from(i) * 3.0)), None)
                    .unwrap()
            })
            .collect();
        (scene, building, levels)
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(f64, f64),
        Move(usize, f64, f64),
        Rotate(usize, f64),
        Hide(usize),
        Delete(usize),
        Group(usize, usize),
        Ungroup(usize),
        Nest(usize, usize),
        Stack(usize),
        Batch(Vec<Step>),
    }

    /// One mutation recorded into a transaction.
    #[derive(Clone, Debug)]
    enum Step {
        Create(usize, f64),
        Shift(usize, f64),
        Remove(usize),
        Reparent(usize, usize),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (any::<usize>(), -10.0..10.0_f64).prop_map(|(i, x)| Step::Create(i, x)),
            (any::<usize>(), -10.0..10.0_f64).prop_map(|(i, x)| Step::Shift(i, x)),
            any::<usize>().prop_map(Step::Remove),
            (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Step::Reparent(i, j)),
        ]
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-10.0..10.0_f64, -10.0..10.0_f64).prop_map(|(x, y)| Op::Add(x, y)),
            (any::<usize>(), -10.0..10.0_f64, -10.0..10.0_f64)
                .prop_map(|(i, x, y)| Op::Move(i, x, y)),
            (any::<usize>(), -PI..PI).prop_map(|(i, r)| Op::Rotate(i, r)),
            any::<usize>().prop_map(Op::Hide),
            any::<usize>().prop_map(Op::Delete),
            (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Group(a, b)),
            any::<usize>().prop_map(Op::Ungroup),
            (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Nest(a, b)),
            any::<usize>().prop_map(Op::Stack),
            prop::collection::vec(step(), 1..6).prop_map(Op::Batch),
        ]
    }

    /// Direct children of every level, in level order.
    fn placed(scene: &Scene, levels: &[NodeId]) -> Vec<NodeId> {
        levels
            .iter()
            .filter_map(|l| scene.get_node_by_id(l))
            .flat_map(|l| l.child_ids())
            .collect()
    }

    fn nth(nodes: &[NodeId], i: usize) -> Option<NodeId> {
        nodes.get(i % nodes.len().max(1)).cloned()
    }

    fn record(tx: &mut Transaction, scene: &mut Scene, levels: &[NodeId], step: Step) {
        let nodes = placed(scene, levels);
        let level = &levels[0];
        match step {
            Step::Create(i, x) => {
                let count = scene.get_node_by_id(level).map_or(0, |l| l.child_count());
                let tree = NodeTree::new(Node::new(NodeKind::item(
                    "crate",
                    Point::new(x, 0.0),
                    Size::new(1.0, 1.0),
                )));
                let _ = tx.create(scene, &tree, Some(level), Some(i % (count + 1)));
            }
            Step::Shift(i, x) => {
                if let Some(id) = nth(&nodes, i) {
                    let _ = tx.update(scene, &id, &NodePatch::new().position(Point::new(x, x)));
                }
            }
            Step::Remove(i) => {
                if let Some(id) = nth(&nodes, i) {
                    let _ = tx.delete(scene, &id);
                }
            }
            Step::Reparent(i, j) => {
                // Either onto the other level or into a sibling; non-groups refuse.
                let target = if j % 2 == 0 {
                    Some(levels[1].clone())
                } else {
                    nth(&nodes, j / 2)
                };
                if let (Some(id), Some(target)) = (nth(&nodes, i), target) {
                    tx.capture_snapshot(scene, &id);
                    let _ = scene.reparent(&id, Some(&target), Some(0));
                }
            }
        }
    }

    /// Apply `op` through `history`; refusals are fine, they record nothing.
    fn apply(
        history: &mut History,
        scene: &mut Scene,
        building: &NodeId,
        levels: &[NodeId],
        op: Op,
    ) {
        let nodes = placed(scene, levels);
        let pick = |i: usize| nth(&nodes, i);
        let _ = match op {
            Op::Add(x, y) => history.execute(
                scene,
                AddNode::new(
                    Node::new(NodeKind::item("box", Point::new(x, y), Size::new(1.0, 1.0))),
                    Some(levels[0].clone()),
                ),
            ),
            Op::Move(i, x, y) => match pick(i) {
                Some(id) => history.execute(
                    scene,
                    UpdateNode::new(id, NodePatch::new().position(Point::new(x, y))),
                ),
                None => Ok(()),
            },
            Op::Rotate(i, r) => match pick(i) {
                Some(id) => history.execute(scene, UpdateNode::new(id, NodePatch::new().rotation(r))),
                None => Ok(()),
            },
            Op::Hide(i) => match pick(i) {
                Some(id) => history.execute(scene, UpdateNode::new(id, NodePatch::new().visible(false))),
                None => Ok(()),
            },
            Op::Delete(i) => match pick(i) {
                Some(id) => history.execute(scene, DeleteNode::new(id)),
                None => Ok(()),
            },
            Op::Group(a, b) => match (pick(a), pick(b)) {
                (Some(a), Some(b)) => history.execute(scene, GroupNodes::new([a, b])),
                _ => Ok(()),
            },
            Op::Ungroup(i) => match pick(i) {
                Some(id) => history.execute(scene, UngroupNodes::new(id)),
                None => Ok(()),
            },
            Op::Nest(a, b) => match (pick(a), pick(b)) {
                (Some(id), Some(into)) => history.execute(scene, MoveNode::new(id, into).at(0)),
                _ => Ok(()),
            },
            Op::Stack(n) => {
                let mut order = scene
                    .get_node_by_id(building)
                    .map(|b| b.child_ids())
                    .unwrap_or_default();
                if !order.is_empty() {
                    let len = order.len();
                    order.rotate_left(n % len);
                }
                history.execute(scene, ReorderLevels::new(building.clone(), order))
            }
            Op::Batch(steps) => {
                history.start_transaction(scene, "Batch");
                for step in steps {
                    if let Some(tx) = history.transaction() {
                        record(tx, scene, levels, step);
                    }
                }
                history.commit_transaction(scene);
                Ok(())
            }
        };
    }

    fn close(a: &SceneDocument, b: &SceneDocument) -> bool {
        // Group/ungroup go through trigonometry; compare geometry with a tolerance.
        let a = serde_json::to_value(a).unwrap();
        let b = serde_json::to_value(b).unwrap();
        values_close(&a, &b)
    }

    fn values_close(a: &serde_json::Value, b: &serde_json::Value) -> bool {
        use serde_json::Value;
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() < 1e-6,
                _ => x == y,
            },
            (Value::Array(x), Value::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_close(x, y))
            }
            (Value::Object(x), Value::Object(y)) => {
                x.len() == y.len()
                    && x.iter()
                        .all(|(k, v)| y.get(k).is_some_and(|w| values_close(v, w)))
            }
            _ => a == b,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn undo_all_restores_initial_state_and_redo_all_the_final(
            ops in prop::collection::vec(op(), 1..30),
        ) {
            let (mut scene, building, levels) = street();
            let mut history = History::with_limit(100);
            let initial = scene.to_document();
            for op in ops {
                apply(&mut history, &mut scene, &building, &levels, op);
            }
            let last = scene.to_document();

            while history.undo(&mut scene) {}
            prop_assert!(close(&scene.to_document(), &initial));
            prop_assert!(scene.validate().is_ok());

            while history.redo(&mut scene) {}
            prop_assert!(close(&scene.to_document(), &last));
            prop_assert!(scene.validate().is_ok());
        }
    }

    #[test]
    fn repeated_delete_is_idempotent() {
        let (mut scene, level) = house();
        let id = scene
            .create(
                Node::new(NodeKind::item("box", Point::ORIGIN, Size::new(1.0, 1.0))),
                Some(&level),
            )
            .unwrap();
        let mut history = History::new();
        history.execute(&mut scene, DeleteNode::new(id.clone())).unwrap();
        let after = scene.to_document();
        assert!(history.execute(&mut scene, DeleteNode::new(id)).is_err());
        assert_eq!(scene.to_document(), after);
        assert_eq!(history.undo_depth(), 1);
    }

    #[test]
    #[traced_test]
    fn grouping_across_parents_is_refused_and_logged() {
        let (mut scene, level) = house();
        let g = scene
            .create(Node::new(NodeKind::group(Point::ORIGIN, 0.0)), Some(&level))
            .unwrap();
        let a = scene
            .create(
                Node::new(NodeKind::item("box", Point::ORIGIN, Size::new(1.0, 1.0))),
                Some(&level),
            )
            .unwrap();
        let b = scene
            .create(
                Node::new(NodeKind::item("box", Point::new(2.0, 0.0), Size::new(1.0, 1.0))),
                Some(&g),
            )
            .unwrap();
        let mut history = History::new();
        let result = history.execute(&mut scene, GroupNodes::new([a, b]));
        assert!(matches!(result, Err(SceneError::MixedParents)));
        assert_eq!(history.undo_depth(), 0);
        assert!(logs_contain("command refused"));
    }

    #[test]
    fn group_then_ungroup_then_undo_both() {
        let (mut scene, level) = house();
        let ids: Vec<NodeId> = (0..3)
            .map(|i| {
                scene
                    .create(
                        Node::new(NodeKind::item(
                            "box",
                            Point::new(f64::from(i) * 3.0, 1.0),
                            Size::new(1.0, 2.0),
                        )),
                        Some(&level),
                    )
                    .unwrap()
            })
            .collect();
        let before = scene.to_document();
        let mut history = History::new();
        let group = GroupNodes::new(ids.clone());
        let g = group.group_id().clone();
        history.execute(&mut scene, group).unwrap();
        history
            .execute(&mut scene, UpdateNode::new(g.clone(), NodePatch::new().rotation(0.7)))
            .unwrap();
        history.execute(&mut scene, UngroupNodes::new(g.clone())).unwrap();
        assert!(!scene.contains(&g));
        assert_eq!(scene.get_node_by_id(&level).unwrap().child_ids(), ids);

        while history.undo(&mut scene) {}
        assert_eq!(scene.to_document(), before);
        assert_eq!(history.redo_label(), Some("Group"));
    }
}
