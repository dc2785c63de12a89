// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node store: structure, mutation, traversal and change notification.

use std::collections::{HashMap, HashSet};

use kurbo::Rect;

use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::grid::SpatialGrid;
use crate::transform::{Frame, transform_rect_bbox};
use crate::types::{EditorState, KindTraits, Node, NodeId, NodeKind, NodePatch, NodeTree, NodeType};

/// Internal generational handle of a stored node.
///
/// Slots are reused after removal with a bumped generation, so a key taken before a
/// delete never aliases a node created afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey(u32, u32);

impl NodeKey {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "NodeKey uses 32-bit indices by design."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A change notification delivered to subscribers after the mutation completed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneChange {
    /// A node was added.
    Created(NodeId),
    /// A node's data or parent changed.
    Updated(NodeId),
    /// A node was removed.
    Deleted(NodeId),
    /// The children of this node were reordered.
    Reordered(NodeId),
    /// The whole scene was cleared.
    Reset,
}

/// Handle returned by [`Scene::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SceneChange)>;

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    node: Node,
}

/// The scene graph of one document.
///
/// The store is the single source of truth: `Node::parent_id` mirrors the child lists
/// and the [`SpatialGrid`] is derived from node geometry, both maintained synchronously
/// by every mutation.
pub struct Scene {
    config: SceneConfig,
    slots: Vec<Option<Slot>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    by_id: HashMap<NodeId, NodeKey>,
    roots: Vec<NodeKey>,
    grid: SpatialGrid,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    revision: u64,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.by_id.len())
            .field("roots", &self.roots.len())
            .field("free_list", &self.free_list.len())
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .field("grid", &self.grid)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a stored node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    scene: &'a Scene,
    key: NodeKey,
    slot: &'a Slot,
}

impl core::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.slot.node.id)
            .field("type", &self.slot.node.node_type())
            .field("children", &self.slot.children.len())
            .finish()
    }
}

impl<'a> NodeRef<'a> {
    /// Internal key of the node.
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// The node's id.
    pub fn id(&self) -> &'a NodeId {
        &self.slot.node.id
    }

    /// The node's data.
    pub fn data(&self) -> &'a Node {
        &self.slot.node
    }

    /// The node's type.
    pub fn node_type(&self) -> NodeType {
        self.slot.node.node_type()
    }

    /// The parent, or `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        self.scene.node_ref(self.slot.parent?)
    }

    /// Children in order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + use<'a> {
        let scene = self.scene;
        self.slot
            .children
            .iter()
            .filter_map(move |&k| scene.node_ref(k))
    }

    /// Ids of the children in order.
    pub fn child_ids(&self) -> Vec<NodeId> {
        self.children().map(|c| c.id().clone()).collect()
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.slot.children.len()
    }

    /// Position among the parent's children (or among the roots).
    pub fn index_in_parent(&self) -> usize {
        let siblings = match self.slot.parent.and_then(|p| self.scene.slot(p)) {
            Some(p) => &p.children,
            None => &self.scene.roots,
        };
        siblings.iter().position(|&k| k == self.key).unwrap_or(0)
    }
}

impl Scene {
    /// Create an empty scene with the default configuration.
    pub fn new() -> Self {
        Self::build(SceneConfig::default())
    }

    /// Create an empty scene with a validated configuration.
    pub fn with_config(config: SceneConfig) -> Result<Self, SceneError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SceneConfig) -> Self {
        Self {
            grid: SpatialGrid::new(config.grid_cell_size),
            config,
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            by_id: HashMap::new(),
            roots: Vec::new(),
            listeners: Vec::new(),
            next_subscription: 0,
            revision: 0,
        }
    }

    /// The configuration this scene was built with.
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Monotonic counter bumped by every change notification.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if the scene holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// True if `id` names a live node.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.by_id.contains_key(id)
    }

    // --- reads ---

    /// Handle to a node, or `None` if it does not exist (for example, already deleted).
    pub fn get_node_by_id(&self, id: &NodeId) -> Option<NodeRef<'_>> {
        self.node_ref(self.key_of(id)?)
    }

    /// Shortcut for `get_node_by_id(id).map(|n| n.data())`.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        Some(&self.slot(self.key_of(id)?)?.node)
    }

    /// Id of the parent of `id`.
    pub fn parent_id(&self, id: &NodeId) -> Option<NodeId> {
        self.node(id)?.parent_id.clone()
    }

    /// Position of `id` among its siblings.
    pub fn index_in_parent(&self, id: &NodeId) -> Option<usize> {
        self.get_node_by_id(id).map(|n| n.index_in_parent())
    }

    /// Root nodes in order.
    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.roots.iter().filter_map(move |&k| self.node_ref(k))
    }

    /// Every node, depth first in child order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.preorder(&self.roots)
            .into_iter()
            .filter_map(move |k| self.node_ref(k))
    }

    /// First node, depth first, matching `filter`. A linear scan.
    pub fn find(&self, mut filter: impl FnMut(&Node) -> bool) -> Option<NodeRef<'_>> {
        self.iter().find(|n| filter(n.data()))
    }

    /// The level containing `id`, or `id` itself if it is a level.
    pub fn level_of(&self, id: &NodeId) -> Option<NodeId> {
        let mut current = self.get_node_by_id(id);
        while let Some(n) = current {
            if n.node_type() == NodeType::Level {
                return Some(n.id().clone());
            }
            current = n.parent();
        }
        None
    }

    /// Frame introduced by `id` and its consecutive group ancestors.
    ///
    /// Identity unless `id` is a group; other containers carry no offset.
    pub fn group_frame(&self, id: &NodeId) -> Frame {
        self.key_of(id)
            .map_or(Frame::IDENTITY, |k| self.group_frame_of(k))
    }

    /// Frame in which the local geometry of `id` is expressed.
    pub fn parent_frame(&self, id: &NodeId) -> Frame {
        self.key_of(id)
            .and_then(|k| self.slot(k)?.parent)
            .map_or(Frame::IDENTITY, |p| self.group_frame_of(p))
    }

    /// Placement of a placed node after composing its group ancestors.
    pub fn absolute_frame(&self, id: &NodeId) -> Option<Frame> {
        let local = self.node(id)?.kind.frame()?;
        Some(self.parent_frame(id).compose(local))
    }

    /// Deep copy of `id` and its subtree with editor-only state stripped.
    pub fn snapshot_tree(&self, id: &NodeId) -> Option<NodeTree> {
        self.snapshot_key(self.key_of(id)?)
    }

    pub(crate) fn snapshot_key(&self, key: NodeKey) -> Option<NodeTree> {
        let slot = self.slot(key)?;
        Some(NodeTree {
            node: slot.node.without_transient(),
            children: slot
                .children
                .iter()
                .filter_map(|&c| self.snapshot_key(c))
                .collect(),
        })
    }

    /// Deep copies of every root subtree, in order.
    pub fn snapshot_roots(&self) -> Vec<NodeTree> {
        self.roots
            .iter()
            .filter_map(|&k| self.snapshot_key(k))
            .collect()
    }

    // --- mutations ---

    /// Add `node` under `parent`, appended last. Returns its id.
    ///
    /// Without a parent the type decides: a site goes to the root, a building into the
    /// first site (or the root), a level into the building. Other types need a parent.
    pub fn create(&mut self, node: Node, parent: Option<&NodeId>) -> Result<NodeId, SceneError> {
        self.create_at(node, parent, None)
    }

    /// Add `node` under `parent` at `index` (clamped; `None` appends).
    pub fn create_at(
        &mut self,
        node: Node,
        parent: Option<&NodeId>,
        index: Option<usize>,
    ) -> Result<NodeId, SceneError> {
        self.create_tree(&NodeTree::new(node), parent, index)
    }

    /// Add a whole subtree. Unset ids are generated; nothing is inserted unless every
    /// id is free and every parent/child pair is legal.
    pub fn create_tree(
        &mut self,
        tree: &NodeTree,
        parent: Option<&NodeId>,
        index: Option<usize>,
    ) -> Result<NodeId, SceneError> {
        let mut tree = tree.clone();
        tree.ensure_ids();
        let parent = self.resolve_parent(tree.node.node_type(), parent)?;
        self.check_subtree(&tree, &mut HashSet::new())?;
        let id = tree.node.id.clone();
        let key = self.insert_tree(tree, parent, index);
        self.reindex_subtree(key);
        self.debug_validate();
        Ok(id)
    }

    /// Insert a validated root subtree during document load.
    pub(crate) fn create_root_tree(&mut self, tree: &NodeTree) -> Result<NodeId, SceneError> {
        let ty = tree.node.node_type();
        if !ty.can_be_root() {
            return Err(SceneError::InvalidParent {
                child: ty,
                parent: None,
            });
        }
        let mut tree = tree.clone();
        tree.ensure_ids();
        self.check_subtree(&tree, &mut HashSet::new())?;
        let id = tree.node.id.clone();
        let key = self.insert_tree(tree, None, None);
        self.reindex_subtree(key);
        self.debug_validate();
        Ok(id)
    }

    /// Shallow-merge `patch` into the node. Unknown ids are a no-op returning false.
    pub fn update_node(&mut self, id: &NodeId, patch: &NodePatch) -> bool {
        let Some(key) = self.key_of(id) else {
            tracing::debug!(%id, "update of missing node ignored");
            return false;
        };
        let Some(slot) = self.slot_mut(key) else {
            return false;
        };
        if let Some(kind) = &patch.kind
            && kind.node_type() != slot.node.node_type()
        {
            tracing::warn!(%id, to = %kind.node_type(), "node type cannot change; kind ignored");
        }
        slot.node.apply(patch);
        self.reindex_subtree(key);
        self.emit(SceneChange::Updated(id.clone()));
        self.debug_validate();
        true
    }

    /// Replace the data of `id` wholesale, keeping its id and place in the tree.
    ///
    /// Refused (false) for unknown ids and for data of a different type.
    pub fn replace_node(&mut self, id: &NodeId, node: Node) -> bool {
        let Some(key) = self.key_of(id) else {
            return false;
        };
        let Some(slot) = self.slot_mut(key) else {
            return false;
        };
        if slot.node.node_type() != node.node_type() {
            tracing::warn!(%id, "replacement has a different type; ignored");
            return false;
        }
        let keep_id = core::mem::take(&mut slot.node.id);
        let keep_parent = slot.node.parent_id.take();
        slot.node = Node {
            id: keep_id,
            parent_id: keep_parent,
            ..node
        };
        self.reindex_subtree(key);
        self.emit(SceneChange::Updated(id.clone()));
        self.debug_validate();
        true
    }

    /// Set transient editor flags. Never recorded in history or documents.
    pub fn set_editor_state(&mut self, id: &NodeId, state: EditorState) -> bool {
        let Some(slot) = self.key_of(id).and_then(|k| self.slot_mut(k)) else {
            return false;
        };
        if slot.node.editor == state {
            return true;
        }
        slot.node.editor = state;
        self.emit(SceneChange::Updated(id.clone()));
        true
    }

    /// Remove `id` and its subtree. Idempotent: returns false if it was already gone.
    pub fn delete_node(&mut self, id: &NodeId) -> bool {
        let Some(key) = self.key_of(id) else {
            return false;
        };
        let _ = self.unlink(key);
        self.remove_subtree(key);
        self.debug_validate();
        true
    }

    /// Move `id` (with its subtree) under `new_parent` at `index`.
    ///
    /// Local geometry is kept verbatim; callers re-express it first when frames differ.
    pub fn reparent(
        &mut self,
        id: &NodeId,
        new_parent: Option<&NodeId>,
        index: Option<usize>,
    ) -> Result<(), SceneError> {
        let key = self
            .key_of(id)
            .ok_or_else(|| SceneError::NodeNotFound(id.clone()))?;
        let ty = self
            .slot(key)
            .map(|s| s.node.node_type())
            .ok_or_else(|| SceneError::NodeNotFound(id.clone()))?;
        let parent = self.resolve_parent(ty, new_parent)?;
        if let Some(p) = parent
            && self.is_ancestor_or_self(key, p)
        {
            return Err(SceneError::Cycle {
                node: id.clone(),
                parent: self.slot(p).map(|s| s.node.id.clone()).unwrap_or_default(),
            });
        }
        let _ = self.unlink(key);
        self.link(key, parent, index);
        self.reindex_subtree(key);
        self.emit(SceneChange::Updated(id.clone()));
        self.debug_validate();
        Ok(())
    }

    /// Replace the order of `parent`'s children. `order` must be a permutation.
    pub fn set_child_order(&mut self, parent: &NodeId, order: &[NodeId]) -> Result<(), SceneError> {
        let pkey = self
            .key_of(parent)
            .ok_or_else(|| SceneError::NodeNotFound(parent.clone()))?;
        let current = self
            .slot(pkey)
            .map(|s| s.children.clone())
            .unwrap_or_default();
        if order.len() != current.len() {
            return Err(SceneError::InvalidOrder(parent.clone()));
        }
        let mut keys = Vec::with_capacity(order.len());
        for id in order {
            let k = self
                .key_of(id)
                .filter(|k| current.contains(k) && !keys.contains(k))
                .ok_or_else(|| SceneError::InvalidOrder(parent.clone()))?;
            keys.push(k);
        }
        if let Some(slot) = self.slot_mut(pkey) {
            slot.children = keys;
        }
        self.emit(SceneChange::Reordered(parent.clone()));
        self.debug_validate();
        Ok(())
    }

    /// Remove every node. Subscribers stay registered.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.generations.clear();
        self.free_list.clear();
        self.by_id.clear();
        self.roots.clear();
        self.grid.clear();
        self.emit(SceneChange::Reset);
    }

    // --- spatial grid ---

    /// Ids of nodes on `level` whose stored bounds touch or intersect `bounds`.
    ///
    /// A conservative broad phase; use a strict overlap test for collision decisions.
    pub fn query(&self, level: &NodeId, bounds: Rect) -> Vec<NodeId> {
        let Some(level) = self.key_of(level) else {
            return Vec::new();
        };
        self.grid
            .query(level, bounds)
            .into_iter()
            .filter_map(|k| self.slot(k).map(|s| s.node.id.clone()))
            .collect()
    }

    /// Stored level-space bounds of an indexed node.
    pub fn indexed_bounds(&self, id: &NodeId) -> Option<Rect> {
        self.grid.bounds(self.key_of(id)?).map(|(_, r)| r)
    }

    /// Rebuild the grid from scratch.
    pub fn rebuild_grid(&mut self) {
        self.grid.clear();
        for root in self.roots.clone() {
            self.reindex(root, None);
        }
    }

    /// The spatial grid, for diagnostics.
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    // --- subscriptions ---

    /// Register a listener called synchronously after every change.
    pub fn subscribe(&mut self, listener: impl FnMut(&SceneChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(s, _)| *s != id);
        self.listeners.len() != before
    }

    // --- invariants ---

    /// Check the structural invariants: ids map to their slots, parent links agree
    /// with child lists and containment rules, and the tree is acyclic.
    pub fn validate(&self) -> Result<(), SceneError> {
        let fail = |msg: String| Err(SceneError::InvariantViolation(msg));
        let mut live = 0;
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            live += 1;
            let key = NodeKey::new(idx, slot.generation);
            let id = &slot.node.id;
            if self.by_id.get(id) != Some(&key) {
                return fail(format!("id map does not point at `{id}`"));
            }
            let ty = slot.node.node_type();
            match slot.parent {
                Some(p) => {
                    let Some(ps) = self.slot(p) else {
                        return fail(format!("parent of `{id}` is dead"));
                    };
                    if !ps.children.contains(&key) {
                        return fail(format!("`{id}` missing from its parent's children"));
                    }
                    if slot.node.parent_id.as_ref() != Some(&ps.node.id) {
                        return fail(format!("parentId of `{id}` is out of date"));
                    }
                    if !ps.node.node_type().can_contain(ty) {
                        return fail(format!("`{}` cannot contain `{id}`", ps.node.id));
                    }
                }
                None => {
                    if !self.roots.contains(&key) || slot.node.parent_id.is_some() {
                        return fail(format!("root `{id}` is not registered as a root"));
                    }
                    if !ty.can_be_root() {
                        return fail(format!("`{id}` cannot be a root"));
                    }
                }
            }
            for &c in &slot.children {
                if self.slot(c).map(|s| s.parent) != Some(Some(key)) {
                    return fail(format!("child of `{id}` does not point back"));
                }
            }
            let mut steps = 0;
            let mut cursor = slot.parent;
            while let Some(p) = cursor {
                steps += 1;
                if steps > self.slots.len() {
                    return fail(format!("cycle above `{id}`"));
                }
                cursor = self.slot(p).and_then(|s| s.parent);
            }
        }
        if live != self.by_id.len() {
            return fail(format!("{} ids for {live} nodes", self.by_id.len()));
        }
        Ok(())
    }

    fn debug_validate(&self) {
        debug_assert!(self.validate().is_ok(), "{:?}", self.validate());
    }

    // --- internals ---

    pub(crate) fn key_of(&self, id: &NodeId) -> Option<NodeKey> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn node_ref(&self, key: NodeKey) -> Option<NodeRef<'_>> {
        Some(NodeRef {
            scene: self,
            key,
            slot: self.slot(key)?,
        })
    }

    fn slot(&self, key: NodeKey) -> Option<&Slot> {
        let s = self.slots.get(key.idx())?.as_ref()?;
        (s.generation == key.1).then_some(s)
    }

    fn slot_mut(&mut self, key: NodeKey) -> Option<&mut Slot> {
        let s = self.slots.get_mut(key.idx())?.as_mut()?;
        if s.generation != key.1 {
            return None;
        }
        Some(s)
    }

    pub(crate) fn emit(&mut self, change: SceneChange) {
        self.revision += 1;
        for (_, listener) in &mut self.listeners {
            listener(&change);
        }
    }

    fn preorder(&self, start: &[NodeKey]) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = start.iter().rev().copied().collect();
        while let Some(k) = stack.pop() {
            let Some(slot) = self.slot(k) else { continue };
            out.push(k);
            stack.extend(slot.children.iter().rev().copied());
        }
        out
    }

    fn first_of(&self, ty: NodeType) -> Option<NodeKey> {
        self.find(|n| n.node_type() == ty).map(|n| n.key)
    }

    fn resolve_parent(
        &self,
        ty: NodeType,
        parent: Option<&NodeId>,
    ) -> Result<Option<NodeKey>, SceneError> {
        let invalid = |parent: Option<&NodeId>| SceneError::InvalidParent {
            child: ty,
            parent: parent.cloned(),
        };
        match parent {
            Some(pid) => {
                let key = self.key_of(pid).ok_or_else(|| invalid(Some(pid)))?;
                match self.slot(key) {
                    Some(p) if p.node.node_type().can_contain(ty) => Ok(Some(key)),
                    _ => Err(invalid(Some(pid))),
                }
            }
            None => match ty {
                NodeType::Site => Ok(None),
                NodeType::Building => Ok(self.first_of(NodeType::Site)),
                NodeType::Level => self
                    .first_of(NodeType::Building)
                    .map(Some)
                    .ok_or(SceneError::NoBuilding),
                _ => Err(invalid(None)),
            },
        }
    }

    fn check_subtree(&self, tree: &NodeTree, seen: &mut HashSet<NodeId>) -> Result<(), SceneError> {
        let id = &tree.node.id;
        if self.by_id.contains_key(id) || !seen.insert(id.clone()) {
            return Err(SceneError::DuplicateId(id.clone()));
        }
        let ty = tree.node.node_type();
        for child in &tree.children {
            let child_ty = child.node.node_type();
            if !ty.can_contain(child_ty) {
                return Err(SceneError::InvalidParent {
                    child: child_ty,
                    parent: Some(id.clone()),
                });
            }
            self.check_subtree(child, seen)?;
        }
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: NodeKey, mut key: NodeKey) -> bool {
        loop {
            if key == ancestor {
                return true;
            }
            match self.slot(key).and_then(|s| s.parent) {
                Some(p) => key = p,
                None => return false,
            }
        }
    }

    fn alloc(&mut self, node: Node) -> NodeKey {
        let slot = |generation| {
            Some(Slot {
                generation,
                parent: None,
                children: Vec::new(),
                node,
            })
        };
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = slot(generation);
            NodeKey::new(idx, generation)
        } else {
            self.slots.push(slot(1));
            self.generations.push(1);
            NodeKey::new(self.slots.len() - 1, 1)
        }
    }

    fn insert_tree(&mut self, tree: NodeTree, parent: Option<NodeKey>, index: Option<usize>) -> NodeKey {
        let NodeTree { node, children } = tree;
        let id = node.id.clone();
        let key = self.alloc(node);
        self.by_id.insert(id.clone(), key);
        self.link(key, parent, index);
        self.emit(SceneChange::Created(id));
        for child in children {
            let _ = self.insert_tree(child, Some(key), None);
        }
        key
    }

    fn link(&mut self, key: NodeKey, parent: Option<NodeKey>, index: Option<usize>) {
        let parent_id = parent.and_then(|p| self.slot(p)).map(|s| s.node.id.clone());
        let siblings = match parent {
            Some(p) => match self.slot_mut(p) {
                Some(s) => &mut s.children,
                None => return,
            },
            None => &mut self.roots,
        };
        let at = index.map_or(siblings.len(), |i| i.min(siblings.len()));
        siblings.insert(at, key);
        if let Some(s) = self.slot_mut(key) {
            s.parent = parent;
            s.node.parent_id = parent_id;
        }
    }

    /// Detach `key` from its parent, returning the former parent and position.
    fn unlink(&mut self, key: NodeKey) -> Option<(Option<NodeKey>, usize)> {
        let parent = self.slot(key)?.parent;
        let siblings = match parent {
            Some(p) => &mut self.slot_mut(p)?.children,
            None => &mut self.roots,
        };
        let at = siblings.iter().position(|&k| k == key)?;
        siblings.remove(at);
        if let Some(s) = self.slot_mut(key) {
            s.parent = None;
            s.node.parent_id = None;
        }
        Some((parent, at))
    }

    fn remove_subtree(&mut self, key: NodeKey) {
        let Some(slot) = self.slot(key) else { return };
        for child in slot.children.clone() {
            self.remove_subtree(child);
        }
        let _ = self.grid.remove(key);
        if let Some(slot) = self.slots[key.idx()].take() {
            self.by_id.remove(&slot.node.id);
            self.free_list.push(key.idx());
            self.emit(SceneChange::Deleted(slot.node.id));
        }
    }

    fn group_frame_of(&self, key: NodeKey) -> Frame {
        let Some(slot) = self.slot(key) else {
            return Frame::IDENTITY;
        };
        let NodeKind::Group { position, rotation } = &slot.node.kind else {
            return Frame::IDENTITY;
        };
        let outer = slot
            .parent
            .map_or(Frame::IDENTITY, |p| self.group_frame_of(p));
        outer.compose(Frame::new(*position, *rotation))
    }

    /// Level and frame of the space the children of `container` live in, if that space
    /// is floor space (the level itself or a chain of groups inside it).
    fn floor_space(&self, container: NodeKey) -> Option<(NodeKey, Frame)> {
        let slot = self.slot(container)?;
        match &slot.node.kind {
            NodeKind::Level { .. } => Some((container, Frame::IDENTITY)),
            NodeKind::Group { position, rotation } => {
                let (level, outer) = self.floor_space(slot.parent?)?;
                Some((level, outer.compose(Frame::new(*position, *rotation))))
            }
            _ => None,
        }
    }

    fn reindex_subtree(&mut self, key: NodeKey) {
        let space = self
            .slot(key)
            .and_then(|s| s.parent)
            .and_then(|p| self.floor_space(p));
        self.reindex(key, space);
    }

    fn reindex(&mut self, key: NodeKey, space: Option<(NodeKey, Frame)>) {
        let Some(slot) = self.slot(key) else { return };
        let indexed = slot
            .node
            .node_type()
            .traits()
            .contains(KindTraits::INDEXED);
        let bounds = space.filter(|_| indexed).and_then(|(level, frame)| {
            let fp = slot.node.kind.footprint()?;
            Some((level, transform_rect_bbox(frame.to_affine(), fp)))
        });
        let child_space = match &slot.node.kind {
            NodeKind::Level { .. } => Some((key, Frame::IDENTITY)),
            NodeKind::Group { position, rotation } => {
                space.map(|(l, f)| (l, f.compose(Frame::new(*position, *rotation))))
            }
            _ => None,
        };
        let children = slot.children.clone();
        match bounds {
            Some((level, r)) => self.grid.upsert(level, key, r),
            None => {
                let _ = self.grid.remove(key);
            }
        }
        for child in children {
            self.reindex(child, child_space);
        }
    }
}
