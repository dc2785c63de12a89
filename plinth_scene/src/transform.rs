// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinate frames and grid snapping.
//!
//! Every node stores its geometry in the frame of its parent. Only `group` nodes
//! introduce a frame of their own; sites, buildings, levels, walls and ceilings carry no
//! offset. A chain of nested groups composes into one [`Frame`].

use kurbo::{Affine, Point, Rect, Vec2};
use plinth_index::Aabb2D;

/// A rigid 2D frame: a rotation (radians, counter-clockwise) followed by a translation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frame {
    /// Origin of the frame in the enclosing space.
    pub origin: Point,
    /// Rotation relative to the enclosing space, radians.
    pub rotation: f64,
}

impl Default for Frame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Frame {
    /// The identity frame.
    pub const IDENTITY: Self = Self {
        origin: Point::ORIGIN,
        rotation: 0.0,
    };

    /// Create a frame.
    pub const fn new(origin: Point, rotation: f64) -> Self {
        Self { origin, rotation }
    }

    /// The equivalent affine map from local to enclosing space.
    pub fn to_affine(self) -> Affine {
        Affine::translate(self.origin.to_vec2()) * Affine::rotate(self.rotation)
    }

    /// Map a local point into the enclosing space.
    pub fn to_world(self, p: Point) -> Point {
        self.origin + rotate(p.to_vec2(), self.rotation)
    }

    /// Map a point of the enclosing space into this frame.
    pub fn to_local(self, p: Point) -> Point {
        rotate(p - self.origin, -self.rotation).to_point()
    }

    /// Place `child`, given in this frame, into the enclosing space. Rotations add.
    pub fn compose(self, child: Self) -> Self {
        Self {
            origin: self.to_world(child.origin),
            rotation: self.rotation + child.rotation,
        }
    }

    /// Express `self` relative to `parent`; both in the same space.
    ///
    /// `parent.compose(self.relative_to(parent)) == self` up to rounding.
    pub fn relative_to(self, parent: Self) -> Self {
        Self {
            origin: parent.to_local(self.origin),
            rotation: self.rotation - parent.rotation,
        }
    }
}

fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Conservative axis-aligned bounds of `rect` under `affine`.
pub fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let p0 = affine * Point::new(rect.x0, rect.y0);
    let p1 = affine * Point::new(rect.x1, rect.y0);
    let p2 = affine * Point::new(rect.x0, rect.y1);
    let p3 = affine * Point::new(rect.x1, rect.y1);
    let min_x = p0.x.min(p1.x).min(p2.x).min(p3.x);
    let min_y = p0.y.min(p1.y).min(p2.y).min(p3.y);
    let max_x = p0.x.max(p1.x).max(p2.x).max(p3.x);
    let max_y = p0.y.max(p1.y).max(p2.y).max(p3.y);
    Rect::new(min_x, min_y, max_x, max_y)
}

pub(crate) fn rect_to_aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::new(r.x0, r.y0, r.x1, r.y1)
}

pub(crate) fn aabb_to_rect(a: Aabb2D<f64>) -> Rect {
    Rect::new(a.min_x, a.min_y, a.max_x, a.max_y)
}

/// Nearest grid intersection of a world point, in tile units.
#[allow(
    clippy::cast_possible_truncation,
    reason = "Grid coordinates saturate to i64."
)]
pub fn world_to_grid(p: Point, tile_size: f64) -> (i64, i64) {
    (
        (p.x / tile_size).round() as i64,
        (p.y / tile_size).round() as i64,
    )
}

/// World position of a grid intersection.
#[allow(
    clippy::cast_precision_loss,
    reason = "Grid coordinates stay far below 2^52."
)]
pub fn grid_to_world((gx, gy): (i64, i64), tile_size: f64) -> Point {
    Point::new(gx as f64 * tile_size, gy as f64 * tile_size)
}

/// Snap a world point to the nearest grid intersection.
pub fn snap_to_grid(p: Point, tile_size: f64) -> Point {
    grid_to_world(world_to_grid(p, tile_size), tile_size)
}
