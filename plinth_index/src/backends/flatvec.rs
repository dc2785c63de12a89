// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend with linear scans. Small and simple; good for tiny sets.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::Aabb2D;

/// Flat vector backend with linear scans.
pub struct FlatVec<T: Copy + PartialOrd + Debug, P: Copy + Debug> {
    slots: Vec<Option<Aabb2D<T>>>,
    _p: core::marker::PhantomData<P>,
}

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Default for FlatVec<T, P> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            _p: core::marker::PhantomData,
        }
    }
}

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Debug for FlatVec<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let alive = self.slots.iter().flatten().count();
        f.debug_struct("FlatVec")
            .field("total_slots", &self.slots.len())
            .field("alive", &alive)
            .finish_non_exhaustive()
    }
}

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> FlatVec<T, P> {
    fn matching<'a>(
        &'a self,
        pred: impl Fn(&Aabb2D<T>) -> bool + 'a,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.slots
                .iter()
                .enumerate()
                .filter_map(move |(i, slot)| slot.as_ref().filter(|a| pred(a)).map(|_| i)),
        )
    }
}

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Backend<T, P> for FlatVec<T, P> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(aabb);
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if let Some(e) = self.slots.get_mut(slot) {
            *e = Some(aabb);
        }
    }

    fn remove(&mut self, slot: usize) {
        if let Some(e) = self.slots.get_mut(slot) {
            *e = None;
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
    }

    fn query_point<'a>(&'a self, x: T, y: T) -> Box<dyn Iterator<Item = usize> + 'a> {
        self.matching(move |a| a.contains_point(x, y))
    }

    fn query_rect<'a>(&'a self, rect: Aabb2D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        self.matching(move |a| !a.intersect(&rect).is_empty())
    }
}
