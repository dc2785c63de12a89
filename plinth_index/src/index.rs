// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::flatvec::FlatVec;
use crate::backends::grid::GridF64;
use crate::types::Aabb2D;

/// Generational handle for entries.
///
/// A key stays valid until its entry is removed. Slots are reused afterwards, but with a
/// bumped generation, so a stale key never aliases a newer entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys are intentionally 32-bit."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct Entry<T, P> {
    generation: u32,
    aabb: Aabb2D<T>,
    payload: P,
}

/// A generic AABB index parameterized by a spatial backend.
///
/// Every mutation is applied to the backend immediately, so queries always observe the
/// last completed insert, update or removal.
#[derive(Debug)]
pub struct IndexGeneric<T: Copy + PartialOrd + Debug, P: Copy + Debug, B: Backend<T, P>> {
    entries: Vec<Option<Entry<T, P>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    len: usize,
    backend: B,
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T, P> + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T, P>,
{
    /// Create an empty index over an explicitly configured backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            backend,
        }
    }

    /// Reserve space for at least `n` entries.
    pub fn reserve(&mut self, n: usize) {
        self.entries.reserve(n);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a new AABB with payload. Returns a stable handle `Key`.
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> Key {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.entries.push(None);
            self.generations.push(1);
            (self.entries.len() - 1, 1)
        };
        self.entries[idx] = Some(Entry {
            generation,
            aabb,
            payload,
        });
        self.backend.insert(idx, aabb);
        self.len += 1;
        Key::new(idx, generation)
    }

    /// Update an existing AABB. Stale keys are ignored.
    pub fn update(&mut self, key: Key, aabb: Aabb2D<T>) {
        let Some(e) = self.entry_mut(key) else {
            return;
        };
        if e.aabb == aabb {
            return;
        }
        e.aabb = aabb;
        self.backend.update(key.idx(), aabb);
    }

    /// Remove an existing AABB, returning its payload. Stale keys are ignored.
    pub fn remove(&mut self, key: Key) -> Option<P> {
        let payload = self.entry_mut(key)?.payload;
        self.entries[key.idx()] = None;
        self.free_list.push(key.idx());
        self.backend.remove(key.idx());
        self.len -= 1;
        Some(payload)
    }

    /// Look up the stored box and payload of a live key.
    pub fn get(&self, key: Key) -> Option<(Aabb2D<T>, P)> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        (e.generation == key.1).then_some((e.aabb, e.payload))
    }

    /// Clear the index.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.generations.clear();
        self.free_list.clear();
        self.len = 0;
        self.backend.clear();
    }

    /// Iterate every live entry in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, Aabb2D<T>, P)> + '_ {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            e.as_ref()
                .map(|e| (Key::new(i, e.generation), e.aabb, e.payload))
        })
    }

    /// Query for entries whose AABB contains the point (boundary included).
    pub fn query_point(&self, x: T, y: T) -> impl Iterator<Item = (Key, P)> + '_ {
        let hits: Vec<_> = self
            .backend
            .query_point(x, y)
            .filter_map(|i| self.live(i))
            .filter(|(_, e)| e.aabb.contains_point(x, y))
            .map(|(k, e)| (k, e.payload))
            .collect();
        hits.into_iter()
    }

    /// Query for entries whose AABB intersects the given rectangle (touching included).
    pub fn query_rect(&self, rect: Aabb2D<T>) -> impl Iterator<Item = (Key, P)> + '_ {
        let hits: Vec<_> = self
            .backend
            .query_rect(rect)
            .filter_map(|i| self.live(i))
            .filter(|(_, e)| !e.aabb.intersect(&rect).is_empty())
            .map(|(k, e)| (k, e.payload))
            .collect();
        hits.into_iter()
    }

    fn live(&self, i: usize) -> Option<(Key, &Entry<T, P>)> {
        let e = self.entries.get(i)?.as_ref()?;
        Some((Key::new(i, e.generation), e))
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry<T, P>> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        if e.generation != key.1 {
            return None;
        }
        Some(e)
    }
}

/// Default index using a flat vector backend.
pub type Index<T, P> = IndexGeneric<T, P, FlatVec<T, P>>;

/// Index backed by a uniform `f64` grid.
pub type GridIndex<P> = IndexGeneric<f64, P, GridF64<P>>;

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Default for Index<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Debug> Index<f64, P> {
    /// Create a grid-backed index with the given cell size and the origin at zero.
    pub fn with_uniform_grid(cell_w: f64, cell_h: f64) -> GridIndex<P> {
        IndexGeneric::with_backend(GridF64::new(cell_w, cell_h, 0.0, 0.0))
    }

    /// Create a grid-backed index with explicit origin offset.
    pub fn with_uniform_grid_with_origin(
        cell_w: f64,
        cell_h: f64,
        origin_x: f64,
        origin_y: f64,
    ) -> GridIndex<P> {
        IndexGeneric::with_backend(GridF64::new(cell_w, cell_h, origin_x, origin_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn insert_update_and_query() {
        let mut idx: Index<i64, u32> = Index::new();
        let k1 = idx.insert(Aabb2D::new(0, 0, 10, 10), 1);
        idx.update(k1, Aabb2D::new(5, 5, 15, 15));

        let hits: Vec<_> = idx.query_point(6, 6).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, 1);
        assert_eq!(idx.query_point(1, 1).count(), 0);
    }

    #[test]
    fn stale_keys_are_ignored() {
        let mut idx: Index<i64, u32> = Index::new();
        let k = idx.insert(Aabb2D::new(0, 0, 10, 10), 1);
        assert_eq!(idx.remove(k), Some(1));
        // Slot is reused with a new generation.
        let k2 = idx.insert(Aabb2D::new(20, 20, 30, 30), 2);
        assert_ne!(k, k2);
        idx.update(k, Aabb2D::new(0, 0, 1, 1));
        assert_eq!(idx.remove(k), None);
        assert_eq!(idx.get(k2), Some((Aabb2D::new(20, 20, 30, 30), 2)));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn grid_matches_flat_vector() {
        let mut flat: Index<f64, u32> = Index::new();
        let mut grid = Index::<f64, u32>::with_uniform_grid(4.0, 4.0);
        let boxes = [
            Aabb2D::<f64>::from_xywh(0.0, 0.0, 1.0, 1.0),
            Aabb2D::<f64>::from_xywh(3.5, 3.5, 2.0, 2.0),
            Aabb2D::<f64>::from_xywh(-7.0, 2.0, 1.0, 9.0),
            Aabb2D::<f64>::from_xywh(12.0, 12.0, 0.0, 0.0),
        ];
        for (i, b) in boxes.iter().copied().enumerate() {
            let _ = flat.insert(b, i as u32);
            let _ = grid.insert(b, i as u32);
        }
        let queries = [
            Aabb2D::new(0.5, 0.5, 4.0, 4.0),
            Aabb2D::new(-10.0, -10.0, -6.5, 3.0),
            Aabb2D::new(12.0, 12.0, 13.0, 13.0),
            Aabb2D::new(100.0, 100.0, 101.0, 101.0),
        ];
        for q in queries {
            let mut a: Vec<_> = flat.query_rect(q).map(|(_, p)| p).collect();
            let mut b: Vec<_> = grid.query_rect(q).map(|(_, p)| p).collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b, "backends disagree for {q:?}");
        }
    }

    #[test]
    fn offset_grid_answers_like_a_zero_origin_grid() {
        let mut plain = Index::<f64, u32>::with_uniform_grid(2.0, 2.0);
        let mut offset = Index::<f64, u32>::with_uniform_grid_with_origin(2.0, 2.0, 0.5, -1.25);
        offset.reserve(8);
        for i in 0..8_u32 {
            let x = f64::from(i) * 1.5 - 4.0;
            let b = Aabb2D::<f64>::from_xywh(x, -x, 1.0, 0.5);
            let _ = plain.insert(b, i);
            let _ = offset.insert(b, i);
        }
        assert_eq!(offset.len(), 8);
        for q in [
            Aabb2D::new(-1.0, -1.0, 1.0, 1.0),
            Aabb2D::new(0.5, -1.25, 2.5, 0.75),
            Aabb2D::new(-4.0, 3.0, -3.0, 4.0),
        ] {
            let mut a: Vec<_> = plain.query_rect(q).map(|(_, p)| p).collect();
            let mut b: Vec<_> = offset.query_rect(q).map(|(_, p)| p).collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b, "origins disagree for {q:?}");
        }
    }

    #[test]
    fn touching_boxes_are_reported_by_rect_query() {
        let mut grid = Index::<f64, u32>::with_uniform_grid(1.0, 1.0);
        let _ = grid.insert(Aabb2D::new(2.0, 3.0, 3.0, 4.0), 7);
        let hits: Vec<_> = grid
            .query_rect(Aabb2D::new(3.0, 3.0, 4.0, 4.0))
            .map(|(_, p)| p)
            .collect();
        assert_eq!(hits, [7]);
    }
}
