// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans (small, simple, the reference behavior).
//! - `grid`: uniform grid for f64 coordinates with an explicit origin, great locality.
//!
//! Pick the grid when boxes are roughly cell-sized and queries are local, which is the
//! common case for floor plans snapped to a tile grid.

pub mod flatvec;
pub mod grid;

pub use flatvec::FlatVec;
pub use grid::GridF64;
