// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Placement policy: can a candidate go here?
//!
//! Rejections are ordinary data. The verdict of the last check is stored on the node as
//! [`EditorState::can_place`](crate::EditorState) for the UI to render.

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::scene::Scene;
use crate::transform::rect_to_aabb;
use crate::types::{AttachmentMode, EditorState, Node, NodeId, NodeKind, NodeType, WallSide};

/// Minimum distance between a wall fixture and either wall end, in grid units.
pub const WALL_END_CLEARANCE: f64 = 1.0;

const EPSILON: f64 = 1e-9;

/// Strict overlap: rectangles that only share an edge or a corner do not overlap.
pub fn overlaps(a: Rect, b: Rect) -> bool {
    rect_to_aabb(a).overlaps(&rect_to_aabb(b))
}

/// The catalog entry currently selected for placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    /// Model reference.
    pub model: String,
    /// Footprint size.
    pub size: Size,
    /// Attachment constraint.
    #[serde(default)]
    pub attach_to: AttachmentMode,
}

impl CatalogItem {
    /// A preview item node for this entry.
    pub fn preview_at(&self, position: Point, rotation: f64, side: Option<WallSide>) -> Node {
        Node::new(NodeKind::Item {
            position,
            rotation,
            size: self.size,
            model: self.model.clone(),
            attach_to: self.attach_to,
            side,
        })
        .as_preview()
    }

    /// The type of node this entry may be hosted by, when it is not free-standing.
    pub fn host_type(&self) -> Option<NodeType> {
        match self.attach_to {
            AttachmentMode::Free => None,
            AttachmentMode::Wall | AttachmentMode::WallSide => Some(NodeType::Wall),
            AttachmentMode::Ceiling => Some(NodeType::Ceiling),
        }
    }
}

/// A fixture's span along its host wall, in wall-local units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WallFixture {
    /// Offset of the fixture center from the wall start.
    pub offset: f64,
    /// Width along the wall.
    pub width: f64,
}

impl WallFixture {
    /// Create a fixture span.
    pub const fn new(offset: f64, width: f64) -> Self {
        Self { offset, width }
    }

    /// Span of a wall-hosted door, window or item.
    pub fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Door { position, size, .. }
            | NodeKind::Window { position, size, .. }
            | NodeKind::Item { position, size, .. } => Some(Self::new(position.x, size.width)),
            _ => None,
        }
    }

    /// Rounded start, end and center offsets.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Wall offsets are small grid coordinates."
    )]
    fn samples(self) -> [i64; 3] {
        let half = 0.5 * self.width;
        [
            (self.offset - half).round() as i64,
            (self.offset + half).round() as i64,
            self.offset.round() as i64,
        ]
    }

    fn conflicts_with(self, other: Self) -> bool {
        let theirs = other.samples();
        self.samples()
            .iter()
            .filter(|s| theirs.contains(s))
            .count()
            >= 2
    }
}

impl WallSide {
    /// Face of a wall running along `direction` that `normal` points out of.
    pub fn from_normal(direction: Vec2, normal: Vec2) -> Self {
        if direction.cross(normal) >= 0.0 {
            Self::Front
        } else {
            Self::Back
        }
    }
}

impl Scene {
    /// Whether a free-standing item with `candidate` level-space bounds fits on `level`.
    ///
    /// Blocked by any non-preview item that truly overlaps and by any column whose
    /// center lies strictly inside the candidate. Slabs, walls and other surfaces never
    /// block. `ignore` skips the candidate itself when it is already in the scene.
    pub fn can_place_item(&self, level: &NodeId, candidate: Rect, ignore: Option<&NodeId>) -> bool {
        let target = rect_to_aabb(candidate);
        self.query(level, candidate).iter().all(|id| {
            if Some(id) == ignore {
                return true;
            }
            let (Some(node), Some(bounds)) = (self.node(id), self.indexed_bounds(id)) else {
                return true;
            };
            if node.editor.preview {
                return true;
            }
            match node.node_type() {
                NodeType::Item => !overlaps(candidate, bounds),
                NodeType::Column => {
                    let c = bounds.center();
                    !target.strictly_contains_point(c.x, c.y)
                }
                _ => true,
            }
        })
    }

    /// Whether `fixture` fits on `wall`.
    ///
    /// It must keep [`WALL_END_CLEARANCE`] from both ends and must not share two or more
    /// of its three rounded samples (both ends and the center) with any non-preview
    /// door, window or item already on the wall.
    pub fn can_place_on_wall(&self, wall: &NodeId, fixture: WallFixture, ignore: Option<&NodeId>) -> bool {
        let Some(host) = self.get_node_by_id(wall) else {
            return false;
        };
        let NodeKind::Wall { start, end, .. } = &host.data().kind else {
            return false;
        };
        let length = (*end - *start).hypot();
        let half = 0.5 * fixture.width;
        if fixture.offset - half < WALL_END_CLEARANCE - EPSILON
            || fixture.offset + half > length - WALL_END_CLEARANCE + EPSILON
        {
            return false;
        }
        host.children()
            .filter(|c| Some(c.id()) != ignore && !c.data().editor.preview)
            .filter_map(|c| WallFixture::of(&c.data().kind))
            .all(|other| !fixture.conflicts_with(other))
    }

    /// Whether a ceiling item with `candidate` footprint fits on `ceiling`.
    pub fn can_place_on_ceiling(&self, ceiling: &NodeId, candidate: Rect, ignore: Option<&NodeId>) -> bool {
        let Some(host) = self.get_node_by_id(ceiling) else {
            return false;
        };
        if host.node_type() != NodeType::Ceiling {
            return false;
        }
        host.children()
            .filter(|c| Some(c.id()) != ignore && !c.data().editor.preview)
            .filter_map(|c| c.data().kind.footprint())
            .all(|fp| !overlaps(candidate, fp))
    }

    /// Offset along `wall` of the projection of a level-space point.
    pub fn wall_offset(&self, wall: &NodeId, point: Point) -> Option<f64> {
        let NodeKind::Wall { start, end, .. } = &self.node(wall)?.kind else {
            return None;
        };
        let axis = *end - *start;
        let length = axis.hypot();
        (length > EPSILON).then(|| (point - *start).dot(axis) / length)
    }

    /// Run the check matching where `id` sits, store the verdict in its editor state and
    /// return it. `None` if the node does not exist.
    ///
    /// Items on a wall use the wall check, items on a ceiling the ceiling check, items
    /// and columns in floor space the grid check. Everything else is always placeable.
    pub fn evaluate_placement(&mut self, id: &NodeId) -> Option<bool> {
        let (verdict, editor) = {
            let node = self.get_node_by_id(id)?;
            let data = node.data();
            let host = node.parent();
            let verdict = match (host.map(|h| h.node_type()), data.node_type()) {
                (Some(NodeType::Wall), _) => {
                    let host = host?;
                    WallFixture::of(&data.kind)
                        .is_none_or(|f| self.can_place_on_wall(host.id(), f, Some(id)))
                }
                (Some(NodeType::Ceiling), _) => {
                    let host = host?;
                    data.kind
                        .footprint()
                        .is_none_or(|fp| self.can_place_on_ceiling(host.id(), fp, Some(id)))
                }
                (_, NodeType::Item | NodeType::Column) => {
                    match (self.level_of(id), self.indexed_bounds(id)) {
                        (Some(level), Some(bounds)) => self.can_place_item(&level, bounds, Some(id)),
                        _ => true,
                    }
                }
                _ => true,
            };
            (verdict, data.editor)
        };
        let _ = self.set_editor_state(
            id,
            EditorState {
                can_place: Some(verdict),
                ..editor
            },
        );
        Some(verdict)
    }
}
