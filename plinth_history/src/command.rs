// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The command trait and the per-node commands.

use core::fmt::Debug;

use plinth_scene::{Node, NodeId, NodePatch, NodeTree, NodeType, Scene, SceneError};

/// A reversible mutation of a [`Scene`].
///
/// A command captures exactly the prior state it needs to reverse itself, the first time
/// it runs. It is executed once, then undone and redone any number of times.
pub trait Command: Debug {
    /// Short human-readable name, for menus and logs.
    fn label(&self) -> &str;

    /// Apply the mutation. On error the scene is left untouched.
    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError>;

    /// Reverse the mutation. Nodes that have gone missing in the meantime are skipped.
    fn undo(&mut self, scene: &mut Scene);

    /// Re-apply after an undo.
    fn redo(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        self.execute(scene)
    }
}

/// Where a node sat before a command moved or removed it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Origin {
    pub(crate) parent: Option<NodeId>,
    pub(crate) index: usize,
}

impl Origin {
    pub(crate) fn of(scene: &Scene, id: &NodeId) -> Option<Self> {
        let node = scene.get_node_by_id(id)?;
        Some(Self {
            parent: node.parent().map(|p| p.id().clone()),
            index: node.index_in_parent(),
        })
    }
}

/// Overwrite the stored data of `node.id` with `node`, logging a refusal.
pub(crate) fn replace_logged(scene: &mut Scene, node: Node) {
    let id = node.id.clone();
    if !scene.replace_node(&id, node) {
        tracing::warn!(%id, "could not restore node data");
    }
}

/// Add a node (with optional nested children) under a parent.
#[derive(Clone, Debug)]
pub struct AddNode {
    tree: NodeTree,
    parent: Option<NodeId>,
    index: Option<usize>,
}

impl AddNode {
    /// Add `node` under `parent`; `None` lets the scene pick the default parent.
    pub fn new(node: Node, parent: Option<NodeId>) -> Self {
        Self::tree(NodeTree::new(node), parent)
    }

    /// Add a whole subtree. Ids are assigned now, so redo recreates the same ids.
    pub fn tree(mut tree: NodeTree, parent: Option<NodeId>) -> Self {
        tree.ensure_ids();
        Self {
            tree,
            parent,
            index: None,
        }
    }

    /// Builder: insert at `index` among the siblings instead of appending.
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Id of the added root node.
    pub fn id(&self) -> &NodeId {
        &self.tree.node.id
    }
}

impl Command for AddNode {
    fn label(&self) -> &str {
        "Add"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let _ = scene.create_tree(&self.tree, self.parent.as_ref(), self.index)?;
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        let _ = scene.delete_node(self.id());
    }
}

/// Shallow field update of one node.
#[derive(Clone, Debug)]
pub struct UpdateNode {
    id: NodeId,
    patch: NodePatch,
    previous: Option<NodePatch>,
}

impl UpdateNode {
    /// Update `id` with `patch`.
    pub fn new(id: NodeId, patch: NodePatch) -> Self {
        Self {
            id,
            patch,
            previous: None,
        }
    }
}

impl Command for UpdateNode {
    fn label(&self) -> &str {
        "Update"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let node = scene
            .node(&self.id)
            .ok_or_else(|| SceneError::NodeNotFound(self.id.clone()))?;
        // Only the first run captures; a redo must not overwrite the undo state.
        if self.previous.is_none() {
            self.previous = Some(node.capture(&self.patch));
        }
        let _ = scene.update_node(&self.id, &self.patch);
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        if let Some(previous) = &self.previous {
            let _ = scene.update_node(&self.id, previous);
        }
    }
}

/// Remove a node and its subtree.
#[derive(Clone, Debug)]
pub struct DeleteNode {
    id: NodeId,
    captured: Option<(NodeTree, Origin)>,
}

impl DeleteNode {
    /// Delete `id`.
    pub fn new(id: NodeId) -> Self {
        Self { id, captured: None }
    }

    /// Id of the deleted node.
    pub fn id(&self) -> &NodeId {
        &self.id
    }
}

impl Command for DeleteNode {
    fn label(&self) -> &str {
        "Delete"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        if self.captured.is_none() {
            let missing = || SceneError::NodeNotFound(self.id.clone());
            let tree = scene.snapshot_tree(&self.id).ok_or_else(missing)?;
            let origin = Origin::of(scene, &self.id).ok_or_else(missing)?;
            self.captured = Some((tree, origin));
        }
        let _ = scene.delete_node(&self.id);
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        let Some((tree, origin)) = &self.captured else {
            return;
        };
        if scene.contains(&self.id) {
            return;
        }
        if let Err(error) = scene.create_tree(tree, origin.parent.as_ref(), Some(origin.index)) {
            tracing::warn!(id = %self.id, %error, "could not restore deleted node");
        }
    }
}

/// Remove several nodes as one step.
///
/// Ids already gone when the batch runs (for example descendants of an earlier entry)
/// are skipped.
#[derive(Clone, Debug)]
pub struct BatchDelete {
    deletes: Vec<DeleteNode>,
    ran: Vec<bool>,
}

impl BatchDelete {
    /// Delete every id, in order.
    pub fn new(ids: impl IntoIterator<Item = NodeId>) -> Self {
        let deletes: Vec<_> = ids.into_iter().map(DeleteNode::new).collect();
        Self {
            ran: vec![false; deletes.len()],
            deletes,
        }
    }
}

impl Command for BatchDelete {
    fn label(&self) -> &str {
        "Delete selection"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let Some(first) = self.deletes.first() else {
            return Err(SceneError::EmptySelection);
        };
        if !self.deletes.iter().any(|d| scene.contains(d.id())) {
            return Err(SceneError::NodeNotFound(first.id().clone()));
        }
        for (delete, ran) in self.deletes.iter_mut().zip(&mut self.ran) {
            *ran = scene.contains(delete.id());
            if *ran {
                delete.execute(scene)?;
            }
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        for (delete, ran) in self.deletes.iter_mut().zip(&self.ran).rev() {
            if *ran {
                delete.undo(scene);
            }
        }
    }
}

/// Replace the order of a building's levels.
#[derive(Clone, Debug)]
pub struct ReorderLevels {
    building: NodeId,
    order: Vec<NodeId>,
    previous: Option<Vec<NodeId>>,
}

impl ReorderLevels {
    /// Reorder the children of `building` to `order`.
    pub fn new(building: NodeId, order: Vec<NodeId>) -> Self {
        Self {
            building,
            order,
            previous: None,
        }
    }
}

impl Command for ReorderLevels {
    fn label(&self) -> &str {
        "Reorder levels"
    }

    fn execute(&mut self, scene: &mut Scene) -> Result<(), SceneError> {
        let building = scene
            .get_node_by_id(&self.building)
            .ok_or_else(|| SceneError::NodeNotFound(self.building.clone()))?;
        if building.node_type() != NodeType::Building {
            return Err(SceneError::InvalidOrder(self.building.clone()));
        }
        let current = building.child_ids();
        scene.set_child_order(&self.building, &self.order)?;
        if self.previous.is_none() {
            self.previous = Some(current);
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) {
        if let Some(previous) = &self.previous
            && let Err(error) = scene.set_child_order(&self.building, previous)
        {
            tracing::warn!(building = %self.building, %error, "could not restore level order");
        }
    }
}
