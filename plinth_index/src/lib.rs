// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plinth Index: a generic 2D AABB index (boundary index).
//!
//! Plinth Index is the broad phase underneath the Plinth scene's spatial grid.
//!
//! - Insert, update, and remove axis-aligned bounding boxes (AABBs) with small `Copy` payloads.
//! - Query by point or intersecting rectangle.
//! - Mutations apply immediately; there is no deferred commit, so a query never observes
//!   stale boxes after a completed update.
//!
//! It is generic over the scalar type `T` and does not depend on any geometry crate.
//! Higher layers (like a scene graph) compute world-space AABBs and feed them here.
//!
//! Backends are pluggable via a simple trait so you can swap the spatial strategy without API churn.
//! The default backend is a flat vector (linear scan). A uniform grid backend is available
//! for `f64` with an explicit origin offset.
//!
//! # Example
//!
//! ```rust
//! use plinth_index::{Index, Aabb2D};
//!
//! // Create an index and add two boxes.
//! let mut idx: Index<i64, u32> = Index::new();
//! let k1 = idx.insert(Aabb2D::new(0, 0, 10, 10), 1);
//! let _k2 = idx.insert(Aabb2D::new(5, 5, 15, 15), 2);
//!
//! // Move the first box away.
//! idx.update(k1, Aabb2D::new(20, 0, 30, 10));
//!
//! // Query a point inside the second box.
//! let hits: Vec<_> = idx.query_point(6, 6).collect();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].1, 2);
//! ```
//!
//! Opt into the grid backend when boxes are roughly cell-sized:
//!
//! ```rust
//! use plinth_index::{Index, GridIndex, Aabb2D};
//!
//! // Use 4×4 cells.
//! let mut idx: GridIndex<u32> = Index::<f64, u32>::with_uniform_grid(4.0, 4.0);
//!
//! let _k = idx.insert(Aabb2D::new(2.0, 3.0, 3.0, 4.0), 1);
//!
//! // Touching counts for queries; use `Aabb2D::overlaps` for strict collision tests.
//! let hits: Vec<_> = idx.query_rect(Aabb2D::new(3.0, 3.0, 4.0, 4.0)).collect();
//! assert_eq!(hits.len(), 1);
//! assert!(!Aabb2D::new(2.0, 3.0, 3.0, 4.0).overlaps(&Aabb2D::new(3.0, 3.0, 4.0, 4.0)));
//! ```
//!
//! ## Choosing a backend
//!
//! - `FlatVec` (default): simplest and smallest, linear scans. Good for very small sets
//!   and as a reference when testing other backends.
//! - `GridF64`: uniform grid; great locality and simple tuning. Choose a cell size so most
//!   AABBs fall within a handful of cells.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod index;
pub mod types;

pub use backend::Backend;
pub use backends::flatvec::FlatVec;
pub use backends::grid::GridF64;
pub use index::{GridIndex, Index, IndexGeneric, Key};
pub use types::Aabb2D;
