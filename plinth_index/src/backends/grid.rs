// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform grid backend. Provides cell-based spatial indexing for `f64` coordinates.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::Aabb2D;

/// Inclusive range of cells `(min_cx, min_cy, max_cx, max_cy)` covered by a box.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CellRange {
    min_cx: i64,
    min_cy: i64,
    max_cx: i64,
    max_cy: i64,
}

impl CellRange {
    fn count(&self) -> u128 {
        let w = (i128::from(self.max_cx) - i128::from(self.min_cx) + 1).max(0);
        let h = (i128::from(self.max_cy) - i128::from(self.min_cy) + 1).max(0);
        w.unsigned_abs().saturating_mul(h.unsigned_abs())
    }

    fn contains(&self, (cx, cy): (i64, i64)) -> bool {
        self.min_cx <= cx && cx <= self.max_cx && self.min_cy <= cy && cy <= self.max_cy
    }

    fn keys(self) -> impl Iterator<Item = (i64, i64)> {
        (self.min_cy..=self.max_cy)
            .flat_map(move |cy| (self.min_cx..=self.max_cx).map(move |cx| (cx, cy)))
    }
}

/// Uniform grid backend.
///
/// Maps each box to the cells it covers, keyed by `(cx, cy)` with
/// `cx = floor((x - origin_x) / cell_w)`. Negative coordinates are fine; the origin only
/// shifts where cell boundaries fall. Every slot remembers its cell range so updates and
/// removals touch only the cells the slot occupies.
pub struct GridF64<P: Copy + Debug> {
    cell_w: f64,
    cell_h: f64,
    origin_x: f64,
    origin_y: f64,
    ranges: Vec<Option<CellRange>>,
    cells: BTreeMap<(i64, i64), Vec<usize>>,
    _p: core::marker::PhantomData<P>,
}

impl<P: Copy + Debug> GridF64<P> {
    /// Create a grid backend with the given cell size and origin offset.
    pub fn new(cell_w: f64, cell_h: f64, origin_x: f64, origin_y: f64) -> Self {
        debug_assert!(
            cell_w > 0.0 && cell_h > 0.0,
            "cell sizes must be positive"
        );
        Self {
            cell_w,
            cell_h,
            origin_x,
            origin_y,
            ranges: Vec::new(),
            cells: BTreeMap::new(),
            _p: core::marker::PhantomData,
        }
    }

    /// Number of non-empty cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.values().filter(|s| !s.is_empty()).count()
    }

    #[inline]
    fn floor_to_i64(v: f64) -> i64 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Cell coordinates are saturated to i64 on purpose."
        )]
        let i = v as i64;
        if (i as f64) > v { i - 1 } else { i }
    }

    fn key_for(&self, x: f64, y: f64) -> (i64, i64) {
        let cx = Self::floor_to_i64((x - self.origin_x) / self.cell_w);
        let cy = Self::floor_to_i64((y - self.origin_y) / self.cell_h);
        (cx, cy)
    }

    fn range_for(&self, a: &Aabb2D<f64>) -> CellRange {
        let (min_cx, min_cy) = self.key_for(a.min_x, a.min_y);
        let (max_cx, max_cy) = self.key_for(a.max_x, a.max_y);
        CellRange {
            min_cx,
            min_cy,
            max_cx,
            max_cy,
        }
    }

    fn link(&mut self, slot: usize, range: CellRange) {
        for key in range.keys() {
            self.cells.entry(key).or_default().push(slot);
        }
        self.ranges[slot] = Some(range);
    }

    fn unlink(&mut self, slot: usize) {
        let Some(range) = self.ranges.get_mut(slot).and_then(Option::take) else {
            return;
        };
        for key in range.keys() {
            if let Some(slots) = self.cells.get_mut(&key) {
                if let Some(pos) = slots.iter().position(|&s| s == slot) {
                    slots.swap_remove(pos);
                }
                if slots.is_empty() {
                    self.cells.remove(&key);
                }
            }
        }
    }

    fn collect(&self, range: CellRange) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        // Walking the occupied cells is cheaper than probing a huge, mostly empty range.
        if range.count() > self.cells.len() as u128 {
            for (key, slots) in &self.cells {
                if range.contains(*key) {
                    set.extend(slots.iter().copied());
                }
            }
        } else {
            for key in range.keys() {
                if let Some(slots) = self.cells.get(&key) {
                    set.extend(slots.iter().copied());
                }
            }
        }
        set
    }
}

impl<P: Copy + Debug> Backend<f64, P> for GridF64<P> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<f64>) {
        if self.ranges.len() <= slot {
            self.ranges.resize_with(slot + 1, || None);
        }
        self.unlink(slot);
        let range = self.range_for(&aabb);
        self.link(slot, range);
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<f64>) {
        let range = self.range_for(&aabb);
        if self.ranges.get(slot).copied().flatten() == Some(range) {
            return;
        }
        if slot < self.ranges.len() {
            self.unlink(slot);
            self.link(slot, range);
        }
    }

    fn remove(&mut self, slot: usize) {
        self.unlink(slot);
    }

    fn clear(&mut self) {
        self.ranges.clear();
        self.cells.clear();
    }

    fn query_point<'a>(&'a self, x: f64, y: f64) -> Box<dyn Iterator<Item = usize> + 'a> {
        let key = self.key_for(x, y);
        let slots = self.cells.get(&key).cloned().unwrap_or_default();
        Box::new(slots.into_iter())
    }

    fn query_rect<'a>(&'a self, rect: Aabb2D<f64>) -> Box<dyn Iterator<Item = usize> + 'a> {
        let range = self.range_for(&rect);
        Box::new(self.collect(range).into_iter())
    }
}

impl<P: Copy + Debug> Debug for GridF64<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.ranges.iter().flatten().count();
        f.debug_struct("GridF64")
            .field("cell_w", &self.cell_w)
            .field("cell_h", &self.cell_h)
            .field("origin_x", &self.origin_x)
            .field("origin_y", &self.origin_y)
            .field("total_slots", &self.ranges.len())
            .field("alive", &alive)
            .field("cells", &self.cells.len())
            .finish_non_exhaustive()
    }
}
