// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commands that change the shape of the tree: move, group and ungroup.
//!
//! All three keep a node's absolute placement when it crosses a group boundary by
//! re-expressing its local geometry in the new parent's frame. Undo never replays the
//! inverse transform; it restores the verbatim copies taken before the first run.

use kurbo::{Point, Rect};
use plinth_scene::{Frame, Node, NodeId, NodeKind, NodeType, Scene, SceneError};

use crate::command::{Command, Origin, replace_logged};

/// Put `node` back under `origin.parent` with its saved data.
///
/// The saved data is only valid in the original parent's frame, so it is not written
/// when the node cannot be moved back.
fn restore(scene: &mut Scene, node: &Node, origin: &Origin) {
    match scene.reparent(&node.id, origin.parent.as_ref(), Some(origin.index)) {
        Ok(()) => replace_logged(scene, node.clone()),
        Err(error) => {
            tracing::warn!(id = %node.id, %error, "could not restore node position");
        }
    }
}

/// Move a node under a new parent, keeping its absolute placement.
#[derive(Clone, Debug)]
pub struct MoveNode {
    id: NodeId,
    new_parent: NodeId,
    index: Option<usize>,
    original: Option<(Node, Origin)>,
}

impl MoveNode {
    /// Move `id` under `new_parent`, appended last.
    pub fn new(id: NodeId, new_parent: NodeId) -> Self {
        Self {
            id,
            new_parent,
            index: None,
            original: None,
        }
    }

    /// Builder: insert at `index` among the new siblings.
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl Command for MoveNode {
    fn label(&self) -> &str {
        "Move"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let missing = || SceneError::NodeNotFound(self.id.clone());
        let node = scene.node(&self.id).ok_or_else(missing)?.clone();
        let origin = Origin::of(scene, &self.id).ok_or_else(missing)?;
        let from = scene.parent_frame(&self.id);
        let to = scene.group_frame(&self.new_parent);
        // Validated first; the geometry is only rewritten once the move is accepted.
        scene.reparent(&self.id, Some(&self.new_parent), self.index)?;
        if self.original.is_none() {
            self.original = Some((node.without_transient(), origin));
        }
        let mut moved = node;
        moved.kind.relocate(from, to);
        replace_logged(scene, moved);
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        if let Some((node, origin)) = &self.original
            && scene.contains(&node.id)
        {
            restore(scene, node, origin);
        }
    }
}

/// Anchor rectangle of a node in its parent's frame: its footprint, or the point it
/// is placed at.
fn anchor_rect(kind: &NodeKind) -> Option<Rect> {
    kind.footprint()
        .or_else(|| kind.anchor().map(|p| Rect::from_points(p, p)))
}

#[derive(Clone, Debug)]
struct Grouped {
    parent: NodeId,
    center: Point,
    members: Vec<(Node, Origin)>,
}

/// Wrap sibling nodes in a new group centered on their bounds.
#[derive(Clone, Debug)]
pub struct GroupNodes {
    ids: Vec<NodeId>,
    group: NodeId,
    state: Option<Grouped>,
}

impl GroupNodes {
    /// Group `ids`. The group's id is fixed now so redo recreates the same node.
    pub fn new(ids: impl IntoIterator<Item = NodeId>) -> Self {
        let mut ids: Vec<NodeId> = ids.into_iter().collect();
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        Self {
            ids,
            group: NodeId::generate(NodeType::Group),
            state: None,
        }
    }

    /// Id of the group this command creates.
    pub fn group_id(&self) -> &NodeId {
        &self.group
    }

    fn plan(&self, scene: &Scene) -> Result<Grouped, SceneError> {
        if self.ids.is_empty() {
            return Err(SceneError::EmptySelection);
        }
        let mut parent: Option<NodeId> = None;
        let mut bounds: Option<Rect> = None;
        let mut members = Vec::with_capacity(self.ids.len());
        for id in &self.ids {
            let node = scene
                .get_node_by_id(id)
                .ok_or_else(|| SceneError::NodeNotFound(id.clone()))?;
            let kind = node.node_type();
            if !kind.is_groupable() {
                return Err(SceneError::NotGroupable {
                    id: id.clone(),
                    kind,
                });
            }
            let this_parent = node.parent().map(|p| p.id().clone());
            match (&parent, this_parent) {
                (_, None) => return Err(SceneError::MixedParents),
                (None, Some(p)) => parent = Some(p),
                (Some(shared), Some(p)) if *shared != p => return Err(SceneError::MixedParents),
                _ => {}
            }
            if let Some(r) = anchor_rect(&node.data().kind) {
                bounds = Some(bounds.map_or(r, |b| b.union(r)));
            }
            members.push((
                node.data().without_transient(),
                Origin {
                    parent: parent.clone(),
                    index: node.index_in_parent(),
                },
            ));
        }
        members.sort_by_key(|(_, origin)| origin.index);
        Ok(Grouped {
            parent: parent.ok_or(SceneError::EmptySelection)?,
            center: bounds.map_or(Point::ORIGIN, |b| b.center()),
            members,
        })
    }
}

impl Command for GroupNodes {
    fn label(&self) -> &str {
        "Group"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let plan = self.plan(scene)?;
        let index = plan.members.first().map(|(_, o)| o.index);
        let group = Node::new(NodeKind::group(plan.center, 0.0)).with_id(self.group.clone());
        let _ = scene.create_at(group, Some(&plan.parent), index)?;
        let frame = Frame::new(plan.center, 0.0);
        for (node, _) in &plan.members {
            scene.reparent(&node.id, Some(&self.group), None)?;
            let mut local = node.clone();
            local.kind.relocate(Frame::IDENTITY, frame);
            replace_logged(scene, local);
        }
        tracing::debug!(group = %self.group, members = plan.members.len(), "grouped");
        if self.state.is_none() {
            self.state = Some(plan);
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        let Some(state) = &self.state else {
            return;
        };
        // Lift the members out first (appended), then drop the empty group and put each
        // member back at its saved index in ascending order.
        for (node, _) in &state.members {
            match scene.reparent(&node.id, Some(&state.parent), None) {
                Ok(()) => replace_logged(scene, node.clone()),
                Err(error) => {
                    tracing::warn!(id = %node.id, %error, "could not lift node out of group");
                }
            }
        }
        let _ = scene.delete_node(&self.group);
        for (node, origin) in &state.members {
            restore(scene, node, origin);
        }
    }
}

#[derive(Clone, Debug)]
struct Ungrouped {
    group: Node,
    origin: Origin,
    children: Vec<Node>,
}

/// Dissolve a group, keeping every child's absolute placement.
#[derive(Clone, Debug)]
pub struct UngroupNodes {
    group: NodeId,
    state: Option<Ungrouped>,
}

impl UngroupNodes {
    /// Ungroup `group`.
    pub fn new(group: NodeId) -> Self {
        Self { group, state: None }
    }
}

impl Command for UngroupNodes {
    fn label(&self) -> &str {
        "Ungroup"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let group = scene
            .get_node_by_id(&self.group)
            .ok_or_else(|| SceneError::NodeNotFound(self.group.clone()))?;
        let NodeKind::Group { position, rotation } = group.data().kind else {
            return Err(SceneError::NotAGroup(self.group.clone()));
        };
        let Some(parent) = group.parent() else {
            return Err(SceneError::NotAGroup(self.group.clone()));
        };
        let state = Ungrouped {
            group: group.data().without_transient(),
            origin: Origin {
                parent: Some(parent.id().clone()),
                index: group.index_in_parent(),
            },
            children: group.children().map(|c| c.data().without_transient()).collect(),
        };
        let live: Vec<Node> = group.children().map(|c| c.data().clone()).collect();
        let frame = Frame::new(position, rotation);
        for (i, child) in live.into_iter().enumerate() {
            scene.reparent(&child.id, state.origin.parent.as_ref(), Some(state.origin.index + i))?;
            let mut lifted = child;
            lifted.kind.relocate(frame, Frame::IDENTITY);
            replace_logged(scene, lifted);
        }
        let _ = scene.delete_node(&self.group);
        if self.state.is_none() {
            self.state = Some(state);
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        let Some(state) = &self.state else {
            return;
        };
        if !scene.contains(&self.group) {
            let restored = scene.create_at(
                state.group.clone(),
                state.origin.parent.as_ref(),
                Some(state.origin.index),
            );
            if let Err(error) = restored {
                tracing::warn!(group = %self.group, %error, "could not recreate group");
                return;
            }
        }
        for (i, child) in state.children.iter().enumerate() {
            restore(
                scene,
                child,
                &Origin {
                    parent: Some(self.group.clone()),
                    index: i,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};
    use kurbo::Size;
    use plinth_scene::NodePatch;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn house() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let _ = scene.create(Node::new(NodeKind::Building {}), None).unwrap();
        let level = scene.create(Node::new(NodeKind::level(0.0)), None).unwrap();
        (scene, level)
    }

    fn item(x: f64, y: f64, r: f64) -> Node {
        let mut kind = NodeKind::item("desk", Point::new(x, y), Size::new(2.0, 1.0));
        kind.set_rotation(r);
        Node::new(kind)
    }

    fn assert_same_frame(a: Frame, b: Frame) {
        assert!((a.origin - b.origin).hypot() < 1e-6, "{a:?} != {b:?}");
        assert!((a.rotation - b.rotation).abs() < 1e-6, "{a:?} != {b:?}");
    }

    #[test]
    #[traced_test]
    fn undo_of_a_move_whose_origin_is_gone_keeps_the_node_in_place() {
        let (mut scene, first) = house();
        let second = scene.create(Node::new(NodeKind::level(3.0)), None).unwrap();
        let g = scene
            .create(Node::new(NodeKind::group(Point::new(4.0, -2.0), 0.6)), Some(&second))
            .unwrap();
        let desk = scene.create(item(1.0, 2.0, 0.0), Some(&first)).unwrap();

        let mut mv = MoveNode::new(desk.clone(), g.clone());
        mv.execute(&mut scene).unwrap();
        let moved = scene.node(&desk).unwrap().clone();
        assert!(scene.delete_node(&first));

        mv.undo(&mut scene);
        assert!(logs_contain("could not restore node position"));
        assert_eq!(scene.parent_id(&desk), Some(g));
        // Still expressed in the group's frame, not the lost level's.
        assert_eq!(scene.node(&desk), Some(&moved));
        scene.validate().unwrap();
    }

    #[test]
    fn move_into_rotated_group_keeps_absolute_placement() {
        let (mut scene, level) = house();
        let g = scene
            .create(
                Node::new(NodeKind::group(Point::new(5.0, 5.0), FRAC_PI_2)),
                Some(&level),
            )
            .unwrap();
        let desk = scene.create(item(1.0, 2.0, 0.25), Some(&level)).unwrap();
        let original = scene.node(&desk).unwrap().clone();
        let before = scene.absolute_frame(&desk).unwrap();

        let mut mv = MoveNode::new(desk.clone(), g.clone());
        mv.execute(&mut scene).unwrap();
        assert_eq!(scene.parent_id(&desk), Some(g.clone()));
        assert_same_frame(scene.absolute_frame(&desk).unwrap(), before);

        mv.undo(&mut scene);
        assert_eq!(scene.node(&desk).unwrap(), &original);
        assert_eq!(scene.parent_id(&desk), Some(level.clone()));

        // And out again.
        mv.redo(&mut scene).unwrap();
        let mut out = MoveNode::new(desk.clone(), level.clone());
        out.execute(&mut scene).unwrap();
        assert_same_frame(scene.absolute_frame(&desk).unwrap(), before);
    }

    #[test]
    fn move_into_own_subtree_is_refused_untouched() {
        let (mut scene, level) = house();
        let outer = scene
            .create(Node::new(NodeKind::group(Point::new(1.0, 1.0), 0.5)), Some(&level))
            .unwrap();
        let inner = scene
            .create(Node::new(NodeKind::group(Point::ORIGIN, 0.0)), Some(&outer))
            .unwrap();
        let before = scene.to_document();
        let mut mv = MoveNode::new(outer, inner);
        assert!(matches!(
            mv.execute(&mut scene),
            Err(SceneError::Cycle { .. })
        ));
        assert_eq!(scene.to_document(), before);
    }

    #[test]
    fn grouping_across_parents_or_structural_nodes_is_refused() {
        let (mut scene, level) = house();
        let g = scene
            .create(Node::new(NodeKind::group(Point::ORIGIN, 0.0)), Some(&level))
            .unwrap();
        let a = scene.create(item(0.0, 0.0, 0.0), Some(&level)).unwrap();
        let b = scene.create(item(3.0, 0.0, 0.0), Some(&g)).unwrap();
        let before = scene.to_document();
        assert!(matches!(
            GroupNodes::new([a.clone(), b]).execute(&mut scene),
            Err(SceneError::MixedParents)
        ));
        assert!(matches!(
            GroupNodes::new([a, level]).execute(&mut scene),
            Err(SceneError::NotGroupable { kind: NodeType::Level, .. })
        ));
        assert!(matches!(
            GroupNodes::new([]).execute(&mut scene),
            Err(SceneError::EmptySelection)
        ));
        assert_eq!(scene.to_document(), before);
    }

    #[test]
    fn group_centers_on_bounds_and_undo_restores_order() {
        let (mut scene, level) = house();
        let a = scene.create(item(0.0, 0.0, 0.0), Some(&level)).unwrap();
        let spacer = scene.create(item(10.0, 10.0, 0.0), Some(&level)).unwrap();
        let b = scene.create(item(4.0, 2.0, 0.0), Some(&level)).unwrap();
        let before = scene.to_document();

        let mut group = GroupNodes::new([b.clone(), a.clone()]);
        group.execute(&mut scene).unwrap();
        let g = group.group_id().clone();
        // Union of [0,2]x[0,1] and [4,6]x[2,3].
        assert_eq!(scene.node(&g).unwrap().kind.position(), Some(Point::new(3.0, 1.5)));
        assert_eq!(
            scene.get_node_by_id(&g).unwrap().child_ids(),
            vec![a.clone(), b.clone()]
        );
        assert_eq!(
            scene.get_node_by_id(&level).unwrap().child_ids(),
            vec![g.clone(), spacer]
        );
        assert_eq!(scene.node(&a).unwrap().kind.position(), Some(Point::new(-3.0, -1.5)));

        group.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
        group.redo(&mut scene).unwrap();
        assert!(scene.contains(&g));
    }

    #[test]
    fn ungroup_then_undo_restores_group_and_children() {
        let (mut scene, level) = house();
        let g = scene
            .create(
                Node::new(NodeKind::group(Point::new(2.0, 3.0), PI / 3.0)).with_name("Nook"),
                Some(&level),
            )
            .unwrap();
        let a = scene.create(item(1.0, 0.0, 0.1), Some(&g)).unwrap();
        let b = scene.create(item(-1.0, 2.0, -0.4), Some(&g)).unwrap();
        let before = scene.to_document();
        let abs_a = scene.absolute_frame(&a).unwrap();
        let abs_b = scene.absolute_frame(&b).unwrap();

        let mut ungroup = UngroupNodes::new(g.clone());
        ungroup.execute(&mut scene).unwrap();
        assert!(!scene.contains(&g));
        assert_eq!(
            scene.get_node_by_id(&level).unwrap().child_ids(),
            vec![a.clone(), b.clone()]
        );
        assert_same_frame(scene.absolute_frame(&a).unwrap(), abs_a);
        assert_same_frame(scene.absolute_frame(&b).unwrap(), abs_b);

        ungroup.undo(&mut scene);
        assert_eq!(scene.to_document(), before);
    }

    #[test]
    fn ungrouping_a_non_group_is_refused() {
        let (mut scene, level) = house();
        let a = scene.create(item(0.0, 0.0, 0.0), Some(&level)).unwrap();
        assert!(matches!(
            UngroupNodes::new(a).execute(&mut scene),
            Err(SceneError::NotAGroup(_))
        ));
    }

    #[test]
    fn walls_keep_their_world_bounds_when_moved() {
        let (mut scene, level) = house();
        let g = scene
            .create(
                Node::new(NodeKind::group(Point::new(3.0, 0.0), FRAC_PI_2)),
                Some(&level),
            )
            .unwrap();
        let wall = scene
            .create(
                Node::new(NodeKind::wall(Point::new(0.0, 0.0), Point::new(4.0, 0.0))),
                Some(&level),
            )
            .unwrap();
        let bounds = scene.indexed_bounds(&wall).unwrap();
        MoveNode::new(wall.clone(), g).execute(&mut scene).unwrap();
        let moved = scene.indexed_bounds(&wall).unwrap();
        assert!((moved.x0 - bounds.x0).abs() < 1e-9 && (moved.y1 - bounds.y1).abs() < 1e-9);
        let NodeKind::Wall { start, .. } = scene.node(&wall).unwrap().kind else {
            panic!("wall expected");
        };
        // Local to a group at (3, 0) turned a quarter: (0, 0) sits at (0, 3).
        assert!((start - Point::new(0.0, 3.0)).hypot() < 1e-9);
    }

    proptest! {
        #[test]
        fn ungroup_of_group_restores_absolute_placement(
            nodes in prop::collection::vec(
                (-20.0..20.0_f64, -20.0..20.0_f64, -PI..PI),
                1..6,
            ),
            group_rotation in -PI..PI,
        ) {
            let (mut scene, level) = house();
            let ids: Vec<NodeId> = nodes
                .iter()
                .map(|&(x, y, r)| scene.create(item(x, y, r), Some(&level)).unwrap())
                .collect();
            let before: Vec<Frame> = ids.iter().map(|id| scene.absolute_frame(id).unwrap()).collect();

            let mut group = GroupNodes::new(ids.clone());
            group.execute(&mut scene).unwrap();
            let g = group.group_id().clone();
            // Spin the group, then compensate by hand so absolute placement is kept.
            let center = scene.node(&g).unwrap().kind.position().unwrap();
            let spun = Frame::new(center, group_rotation);
            for id in &ids {
                let mut node = scene.node(id).unwrap().clone();
                node.kind.relocate(Frame::new(center, 0.0), spun);
                scene.replace_node(id, node);
            }
            scene.update_node(&g, &NodePatch::new().rotation(group_rotation));
            for (id, frame) in ids.iter().zip(&before) {
                let now = scene.absolute_frame(id).unwrap();
                prop_assert!((now.origin - frame.origin).hypot() < 1e-6);
            }

            UngroupNodes::new(g).execute(&mut scene).unwrap();
            for (id, frame) in ids.iter().zip(&before) {
                let now = scene.absolute_frame(id).unwrap();
                prop_assert!((now.origin - frame.origin).hypot() < 1e-6);
                prop_assert!((now.rotation - frame.rotation).abs() < 1e-6);
            }
        }
    }
}
