// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-level broad-phase grid.

use std::collections::HashMap;

use kurbo::Rect;
use plinth_index::{GridIndex, Index, Key};

use crate::scene::NodeKey;
use crate::transform::{aabb_to_rect, rect_to_aabb};

/// Spatial grid over the indexed nodes of every level.
///
/// Holds node keys only. The scene owns all data and keeps this grid in step with every
/// mutation, so lookups never see a stale box after a completed call.
pub struct SpatialGrid {
    cell_size: f64,
    levels: HashMap<NodeKey, GridIndex<NodeKey>>,
    entries: HashMap<NodeKey, (NodeKey, Key)>,
}

impl core::fmt::Debug for SpatialGrid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpatialGrid")
            .field("cell_size", &self.cell_size)
            .field("levels", &self.levels.len())
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl SpatialGrid {
    pub(crate) fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            levels: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    /// Cell edge length in grid units.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of indexed nodes across all levels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of levels holding at least one indexed node.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Insert `node` into `level`, or move it there with new bounds.
    pub(crate) fn upsert(&mut self, level: NodeKey, node: NodeKey, bounds: Rect) {
        let aabb = rect_to_aabb(bounds);
        if let Some(&(current, key)) = self.entries.get(&node) {
            if current == level {
                if let Some(index) = self.levels.get_mut(&level) {
                    index.update(key, aabb);
                }
                return;
            }
            self.remove(node);
        }
        let cell = self.cell_size;
        let index = self
            .levels
            .entry(level)
            .or_insert_with(|| Index::<f64, NodeKey>::with_uniform_grid(cell, cell));
        let key = index.insert(aabb, node);
        self.entries.insert(node, (level, key));
        tracing::trace!(?node, ?level, ?bounds, "grid insert");
    }

    /// Drop `node` from the grid. Returns false if it was not indexed.
    pub(crate) fn remove(&mut self, node: NodeKey) -> bool {
        let Some((level, key)) = self.entries.remove(&node) else {
            return false;
        };
        if let Some(index) = self.levels.get_mut(&level) {
            let _ = index.remove(key);
            if index.is_empty() {
                self.levels.remove(&level);
            }
        }
        tracing::trace!(?node, ?level, "grid remove");
        true
    }

    /// Keys on `level` whose stored bounds touch or intersect `bounds`.
    pub(crate) fn query(&self, level: NodeKey, bounds: Rect) -> Vec<NodeKey> {
        self.levels
            .get(&level)
            .map(|index| {
                index
                    .query_rect(rect_to_aabb(bounds))
                    .map(|(_, node)| node)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Level and stored bounds of an indexed node.
    pub(crate) fn bounds(&self, node: NodeKey) -> Option<(NodeKey, Rect)> {
        let &(level, key) = self.entries.get(&node)?;
        let (aabb, _) = self.levels.get(&level)?.get(key)?;
        Some((level, aabb_to_rect(aabb)))
    }

    pub(crate) fn clear(&mut self) {
        self.levels.clear();
        self.entries.clear();
    }
}
