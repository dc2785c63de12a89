// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: node identifiers, kinds and their geometry, patches, and
//! nested node trees.

use core::borrow::Borrow;
use core::fmt;

use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transform::{Frame, transform_rect_bbox};

/// Identifier of a node.
///
/// Ids are plain strings so that persisted documents stay readable and stable across
/// reloads. Generated ids carry the kind as a prefix, for example `item_3f2a...`.
/// The empty id is "unset"; it is replaced by a generated one when the node is added.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id prefixed with the kind's label.
    pub fn generate(ty: NodeType) -> Self {
        Self(format!("{}_{}", ty.prefix(), Uuid::new_v4().simple()))
    }

    /// True for the empty placeholder id.
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Payload-free discriminant of a [`NodeKind`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    /// The plot a building stands on.
    Site,
    /// A building; contains levels.
    Building,
    /// One floor of a building; the unit of spatial partitioning.
    Level,
    /// Transform container for arbitrary groupable siblings.
    Group,
    /// Straight wall segment.
    Wall,
    /// Door hosted by a wall.
    Door,
    /// Window hosted by a wall.
    Window,
    /// Furnishing item.
    Item,
    /// Roof block.
    Roof,
    /// Floor slab polygon.
    Slab,
    /// Ceiling polygon.
    Ceiling,
    /// Structural column.
    Column,
    /// Named area.
    Zone,
    /// Imported scan.
    Scan,
    /// Traced reference image.
    ReferenceImage,
}

bitflags::bitflags! {
    /// Static capabilities of a [`NodeType`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct KindTraits: u8 {
        /// Site, building or level. Never grouped, never removed through group commands.
        const STRUCTURAL = 0b0000_0001;
        /// May be wrapped in a group and live inside one.
        const GROUPABLE  = 0b0000_0010;
        /// Occupies the per-level spatial grid when it sits in floor space.
        const INDEXED    = 0b0000_0100;
        /// Carries a position and a rotation.
        const PLACED     = 0b0000_1000;
    }
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::Site,
        Self::Building,
        Self::Level,
        Self::Group,
        Self::Wall,
        Self::Door,
        Self::Window,
        Self::Item,
        Self::Roof,
        Self::Slab,
        Self::Ceiling,
        Self::Column,
        Self::Zone,
        Self::Scan,
        Self::ReferenceImage,
    ];

    /// Capabilities of this type.
    pub const fn traits(self) -> KindTraits {
        const G: KindTraits = KindTraits::GROUPABLE;
        const I: KindTraits = KindTraits::INDEXED;
        const P: KindTraits = KindTraits::PLACED;
        match self {
            Self::Site | Self::Building | Self::Level => KindTraits::STRUCTURAL,
            Self::Group | Self::Scan | Self::ReferenceImage => G.union(P),
            Self::Wall | Self::Slab | Self::Ceiling => G.union(I),
            Self::Door | Self::Window => P,
            Self::Item | Self::Roof | Self::Column => G.union(I).union(P),
            Self::Zone => G,
        }
    }

    /// Shorthand for the [`KindTraits::GROUPABLE`] bit.
    pub const fn is_groupable(self) -> bool {
        self.traits().contains(KindTraits::GROUPABLE)
    }

    /// Shorthand for the [`KindTraits::STRUCTURAL`] bit.
    pub const fn is_structural(self) -> bool {
        self.traits().contains(KindTraits::STRUCTURAL)
    }

    /// Whether a node of this type may hold `child` in its children list.
    ///
    /// Only groups accept arbitrary re-parented siblings; every other container has a
    /// fixed set of child types.
    pub fn can_contain(self, child: Self) -> bool {
        match self {
            Self::Site => matches!(child, Self::Building | Self::Zone),
            Self::Building => child == Self::Level,
            Self::Level | Self::Group => child.is_groupable(),
            Self::Wall => matches!(child, Self::Door | Self::Window | Self::Item),
            Self::Ceiling => child == Self::Item,
            _ => false,
        }
    }

    /// Whether a node of this type may sit at the root of the scene.
    pub fn can_be_root(self) -> bool {
        matches!(self, Self::Site | Self::Building)
    }

    /// Prefix used by [`NodeId::generate`].
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Site => "site",
            Self::Building => "building",
            Self::Level => "level",
            Self::Group => "group",
            Self::Wall => "wall",
            Self::Door => "door",
            Self::Window => "window",
            Self::Item => "item",
            Self::Roof => "roof",
            Self::Slab => "slab",
            Self::Ceiling => "ceiling",
            Self::Column => "column",
            Self::Zone => "zone",
            Self::Scan => "scan",
            Self::ReferenceImage => "reference_image",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// How a furnishing item attaches to the building.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentMode {
    /// Stands on the floor.
    #[default]
    Free,
    /// Mounted through a wall, visible from both sides.
    Wall,
    /// Mounted on one face of a wall.
    WallSide,
    /// Hangs from a ceiling.
    Ceiling,
}

/// Face of a wall, relative to its start→end direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WallSide {
    /// Left of the direction of travel.
    Front,
    /// Right of the direction of travel.
    Back,
}

fn default_level_height() -> f64 {
    2.5
}

fn default_wall_thickness() -> f64 {
    0.2
}

fn default_scale() -> f64 {
    1.0
}

/// Kind-specific payload of a node, discriminated by `type` in documents.
///
/// Coordinates are in grid units, expressed in the frame of the node's parent. Only
/// groups introduce a new frame for their children; other containers carry no offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum NodeKind {
    /// The plot.
    Site {
        /// Plot outline.
        #[serde(default)]
        boundary: Vec<Point>,
    },
    /// A building.
    Building {},
    /// One floor.
    Level {
        /// Height of the floor above ground.
        #[serde(default)]
        elevation: f64,
        /// Floor-to-floor height.
        #[serde(default = "default_level_height")]
        height: f64,
    },
    /// Transform container.
    Group {
        /// Origin of the group's frame.
        position: Point,
        /// Rotation of the group's frame, radians.
        #[serde(default)]
        rotation: f64,
    },
    /// Straight wall segment.
    Wall {
        /// Start point.
        start: Point,
        /// End point.
        end: Point,
        /// Thickness across the wall.
        #[serde(default = "default_wall_thickness")]
        thickness: f64,
        /// Height of the wall.
        #[serde(default = "default_level_height")]
        height: f64,
    },
    /// Door; `position.x` is the offset of its center along the host wall.
    Door {
        /// Placement along the wall.
        position: Point,
        /// Rotation, radians.
        #[serde(default)]
        rotation: f64,
        /// Width and height of the opening.
        size: Size,
        /// Opening side.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        side: Option<WallSide>,
    },
    /// Window; `position.x` is the offset of its center along the host wall.
    Window {
        /// Placement along the wall.
        position: Point,
        /// Rotation, radians.
        #[serde(default)]
        rotation: f64,
        /// Width and height of the opening.
        size: Size,
        /// Facing side.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        side: Option<WallSide>,
    },
    /// Furnishing item.
    Item {
        /// Anchor corner of the footprint, or the offset along the host wall when wall-mounted.
        position: Point,
        /// Rotation about the anchor, radians.
        #[serde(default)]
        rotation: f64,
        /// Footprint size.
        size: Size,
        /// Catalog model reference.
        #[serde(default)]
        model: String,
        /// Attachment constraint.
        #[serde(default)]
        attach_to: AttachmentMode,
        /// Mounted face for [`AttachmentMode::WallSide`].
        #[serde(default, skip_serializing_if = "Option::is_none")]
        side: Option<WallSide>,
    },
    /// Roof block.
    Roof {
        /// Anchor corner.
        position: Point,
        /// Rotation, radians.
        #[serde(default)]
        rotation: f64,
        /// Plan size.
        size: Size,
        /// Pitch, radians.
        #[serde(default)]
        pitch: f64,
    },
    /// Floor slab.
    Slab {
        /// Outline.
        polygon: Vec<Point>,
    },
    /// Ceiling.
    Ceiling {
        /// Outline.
        polygon: Vec<Point>,
        /// Height above the level floor.
        #[serde(default = "default_level_height")]
        height: f64,
    },
    /// Structural column, centered on `position`.
    Column {
        /// Center point.
        position: Point,
        /// Rotation, radians.
        #[serde(default)]
        rotation: f64,
        /// Cross-section.
        size: Size,
    },
    /// Named area.
    Zone {
        /// Outline.
        polygon: Vec<Point>,
        /// Display color.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    /// Imported scan.
    Scan {
        /// Asset reference.
        url: String,
        /// Origin.
        position: Point,
        /// Rotation, radians.
        #[serde(default)]
        rotation: f64,
        /// Uniform scale.
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// Traced reference image.
    ReferenceImage {
        /// Asset reference.
        url: String,
        /// Origin.
        position: Point,
        /// Rotation, radians.
        #[serde(default)]
        rotation: f64,
        /// Uniform scale.
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

impl NodeKind {
    /// A level at the given elevation.
    pub fn level(elevation: f64) -> Self {
        Self::Level {
            elevation,
            height: default_level_height(),
        }
    }

    /// A group frame.
    pub fn group(position: Point, rotation: f64) -> Self {
        Self::Group { position, rotation }
    }

    /// A wall with default thickness and height.
    pub fn wall(start: Point, end: Point) -> Self {
        Self::Wall {
            start,
            end,
            thickness: default_wall_thickness(),
            height: default_level_height(),
        }
    }

    /// A free-standing item.
    pub fn item(model: impl Into<String>, position: Point, size: Size) -> Self {
        Self::Item {
            position,
            rotation: 0.0,
            size,
            model: model.into(),
            attach_to: AttachmentMode::Free,
            side: None,
        }
    }

    /// A column centered on `position`.
    pub fn column(position: Point, size: Size) -> Self {
        Self::Column {
            position,
            rotation: 0.0,
            size,
        }
    }

    /// A slab over `polygon`.
    pub fn slab(polygon: Vec<Point>) -> Self {
        Self::Slab { polygon }
    }

    /// Discriminant of this kind.
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Site { .. } => NodeType::Site,
            Self::Building { .. } => NodeType::Building,
            Self::Level { .. } => NodeType::Level,
            Self::Group { .. } => NodeType::Group,
            Self::Wall { .. } => NodeType::Wall,
            Self::Door { .. } => NodeType::Door,
            Self::Window { .. } => NodeType::Window,
            Self::Item { .. } => NodeType::Item,
            Self::Roof { .. } => NodeType::Roof,
            Self::Slab { .. } => NodeType::Slab,
            Self::Ceiling { .. } => NodeType::Ceiling,
            Self::Column { .. } => NodeType::Column,
            Self::Zone { .. } => NodeType::Zone,
            Self::Scan { .. } => NodeType::Scan,
            Self::ReferenceImage { .. } => NodeType::ReferenceImage,
        }
    }

    /// Position and rotation of placed kinds as a frame in parent space.
    pub fn frame(&self) -> Option<Frame> {
        match self {
            Self::Group { position, rotation }
            | Self::Door {
                position, rotation, ..
            }
            | Self::Window {
                position, rotation, ..
            }
            | Self::Item {
                position, rotation, ..
            }
            | Self::Roof {
                position, rotation, ..
            }
            | Self::Column {
                position, rotation, ..
            }
            | Self::Scan {
                position, rotation, ..
            }
            | Self::ReferenceImage {
                position, rotation, ..
            } => Some(Frame::new(*position, *rotation)),
            _ => None,
        }
    }

    fn frame_mut(&mut self) -> Option<(&mut Point, &mut f64)> {
        match self {
            Self::Group { position, rotation }
            | Self::Door {
                position, rotation, ..
            }
            | Self::Window {
                position, rotation, ..
            }
            | Self::Item {
                position, rotation, ..
            }
            | Self::Roof {
                position, rotation, ..
            }
            | Self::Column {
                position, rotation, ..
            }
            | Self::Scan {
                position, rotation, ..
            }
            | Self::ReferenceImage {
                position, rotation, ..
            } => Some((position, rotation)),
            _ => None,
        }
    }

    /// Position of placed kinds.
    pub fn position(&self) -> Option<Point> {
        self.frame().map(|f| f.origin)
    }

    /// Rotation of placed kinds, radians.
    pub fn rotation(&self) -> Option<f64> {
        self.frame().map(|f| f.rotation)
    }

    /// Set the position of a placed kind. Returns false for kinds without one.
    pub fn set_position(&mut self, value: Point) -> bool {
        self.frame_mut().map(|(p, _)| *p = value).is_some()
    }

    /// Set the rotation of a placed kind. Returns false for kinds without one.
    pub fn set_rotation(&mut self, value: f64) -> bool {
        self.frame_mut().map(|(_, r)| *r = value).is_some()
    }

    /// Footprint size of sized kinds.
    pub fn size(&self) -> Option<Size> {
        match self {
            Self::Door { size, .. }
            | Self::Window { size, .. }
            | Self::Item { size, .. }
            | Self::Roof { size, .. }
            | Self::Column { size, .. } => Some(*size),
            _ => None,
        }
    }

    /// Set the footprint size. Returns false for kinds without one.
    pub fn set_size(&mut self, value: Size) -> bool {
        match self {
            Self::Door { size, .. }
            | Self::Window { size, .. }
            | Self::Item { size, .. }
            | Self::Roof { size, .. }
            | Self::Column { size, .. } => {
                *size = value;
                true
            }
            _ => false,
        }
    }

    /// Attachment mode; only items have one.
    pub fn attachment(&self) -> Option<AttachmentMode> {
        match self {
            Self::Item { attach_to, .. } => Some(*attach_to),
            _ => None,
        }
    }

    fn vertices_mut(&mut self) -> Option<Vec<&mut Point>> {
        match self {
            Self::Wall { start, end, .. } => Some(vec![start, end]),
            Self::Slab { polygon }
            | Self::Ceiling { polygon, .. }
            | Self::Zone { polygon, .. } => Some(polygon.iter_mut().collect()),
            _ => None,
        }
    }

    /// Axis-aligned bounds of the node's footprint in its parent's frame.
    ///
    /// Rectangular kinds span `[0, w] × [0, h]` from their anchor, rotated about it; columns
    /// are centered on their position. Walls are inflated by half their thickness.
    pub fn footprint(&self) -> Option<Rect> {
        match self {
            Self::Item {
                position,
                rotation,
                size,
                ..
            }
            | Self::Roof {
                position,
                rotation,
                size,
                ..
            }
            | Self::Door {
                position,
                rotation,
                size,
                ..
            }
            | Self::Window {
                position,
                rotation,
                size,
                ..
            } => Some(transform_rect_bbox(
                Frame::new(*position, *rotation).to_affine(),
                size.to_rect(),
            )),
            Self::Column {
                position,
                rotation,
                size,
            } => Some(transform_rect_bbox(
                Frame::new(*position, *rotation).to_affine(),
                Rect::from_center_size(Point::ORIGIN, *size),
            )),
            Self::Wall {
                start,
                end,
                thickness,
                ..
            } => {
                let half = 0.5 * thickness;
                Some(Rect::from_points(*start, *end).inflate(half, half))
            }
            Self::Slab { polygon } | Self::Ceiling { polygon, .. } | Self::Zone { polygon, .. } => {
                polygon_bounds(polygon)
            }
            _ => None,
        }
    }

    /// A representative point: the position of placed kinds, else the footprint center.
    pub fn anchor(&self) -> Option<Point> {
        self.position()
            .or_else(|| self.footprint().map(|r| r.center()))
    }

    /// Re-express the local geometry, currently relative to `from`, relative to `to`.
    ///
    /// Both frames are given in a common ancestor space. Placed kinds get a new position
    /// and a rotation shifted by the frames' rotation difference; walls and polygons have
    /// every vertex mapped. The node's own children are untouched since they live in the
    /// node's frame.
    pub fn relocate(&mut self, from: Frame, to: Frame) {
        if let Some((position, rotation)) = self.frame_mut() {
            let local = from.compose(Frame::new(*position, *rotation)).relative_to(to);
            *position = local.origin;
            *rotation = local.rotation;
        } else if let Some(vertices) = self.vertices_mut() {
            for v in vertices {
                *v = to.to_local(from.to_world(*v));
            }
        }
    }

    /// Shift the geometry by `delta` in parent space.
    pub fn translate(&mut self, delta: Vec2) {
        self.relocate(Frame::IDENTITY, Frame::new(Point::ORIGIN - delta, 0.0));
    }
}

fn polygon_bounds(polygon: &[Point]) -> Option<Rect> {
    let (first, rest) = polygon.split_first()?;
    Some(
        rest.iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)),
    )
}

fn default_true() -> bool {
    true
}

fn default_opacity() -> u8 {
    100
}

fn clamped_opacity<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(u8::deserialize(deserializer)?.min(100))
}

/// Editor-only state. Never persisted, never captured by undo snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditorState {
    /// The node is an in-flight preview (for example an item following the pointer).
    pub preview: bool,
    /// Verdict of the last placement check, if one ran.
    pub can_place: Option<bool>,
}

impl EditorState {
    /// State for a fresh preview node.
    pub fn preview() -> Self {
        Self {
            preview: true,
            can_place: None,
        }
    }
}

/// A scene node.
///
/// `parent_id` mirrors the store's structure for consumers and documents. It is a lookup
/// key only; the store's child lists are the source of truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique id; unset until added.
    #[serde(default, skip_serializing_if = "NodeId::is_unset")]
    pub id: NodeId,
    /// Parent id, maintained by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Visibility toggle.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Opacity percentage, 0 to 100. Larger stored values load as 100.
    #[serde(default = "default_opacity", deserialize_with = "clamped_opacity")]
    pub opacity: u8,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Kind and geometry.
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Transient editor flags.
    #[serde(skip)]
    pub editor: EditorState,
}

impl Node {
    /// A visible, opaque node with an unset id.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::default(),
            parent_id: None,
            visible: true,
            opacity: 100,
            name: None,
            kind,
            editor: EditorState::default(),
        }
    }

    /// Builder: set an explicit id.
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder: set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: mark as a preview.
    pub fn as_preview(mut self) -> Self {
        self.editor = EditorState::preview();
        self
    }

    /// Discriminant of the node's kind.
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Copy with editor-only state cleared.
    pub fn without_transient(&self) -> Self {
        Self {
            editor: EditorState::default(),
            ..self.clone()
        }
    }

    /// Assign a generated id if none is set, returning the id.
    pub fn ensure_id(&mut self) -> &NodeId {
        if self.id.is_unset() {
            self.id = NodeId::generate(self.node_type());
        }
        &self.id
    }

    /// Shallow-merge `patch` into this node.
    ///
    /// A `kind` that would change the node's type is ignored. Geometric fields that the
    /// kind does not have are ignored too. Returns true if any field was written.
    pub fn apply(&mut self, patch: &NodePatch) -> bool {
        let mut touched = false;
        if let Some(kind) = &patch.kind
            && kind.node_type() == self.node_type()
        {
            self.kind = kind.clone();
            touched = true;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
            touched = true;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
            touched = true;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.min(100);
            touched = true;
        }
        if let Some(p) = patch.position {
            touched |= self.kind.set_position(p);
        }
        if let Some(r) = patch.rotation {
            touched |= self.kind.set_rotation(r);
        }
        if let Some(s) = patch.size {
            touched |= self.kind.set_size(s);
        }
        touched
    }

    /// The patch that restores the fields `patch` would touch to their current values.
    pub fn capture(&self, patch: &NodePatch) -> NodePatch {
        NodePatch {
            name: patch.name.as_ref().map(|_| self.name.clone()),
            visible: patch.visible.map(|_| self.visible),
            opacity: patch.opacity.map(|_| self.opacity),
            position: patch.position.and_then(|_| self.kind.position()),
            rotation: patch.rotation.and_then(|_| self.kind.rotation()),
            size: patch.size.and_then(|_| self.kind.size()),
            kind: patch
                .kind
                .as_ref()
                .filter(|k| k.node_type() == self.node_type())
                .map(|_| self.kind.clone()),
        }
    }
}

/// A shallow field update for [`Node::apply`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    /// New name (`Some(None)` clears it).
    pub name: Option<Option<String>>,
    /// New visibility.
    pub visible: Option<bool>,
    /// New opacity.
    pub opacity: Option<u8>,
    /// New position for placed kinds.
    pub position: Option<Point>,
    /// New rotation for placed kinds.
    pub rotation: Option<f64>,
    /// New size for sized kinds.
    pub size: Option<Size>,
    /// Wholesale replacement of the kind payload (same type only).
    pub kind: Option<NodeKind>,
}

impl NodePatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the position.
    pub fn position(mut self, p: Point) -> Self {
        self.position = Some(p);
        self
    }

    /// Builder: set the rotation.
    pub fn rotation(mut self, r: f64) -> Self {
        self.rotation = Some(r);
        self
    }

    /// Builder: set the size.
    pub fn size(mut self, s: Size) -> Self {
        self.size = Some(s);
        self
    }

    /// Builder: set the name.
    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = Some(name);
        self
    }

    /// Builder: set visibility.
    pub fn visible(mut self, v: bool) -> Self {
        self.visible = Some(v);
        self
    }

    /// Builder: set opacity.
    pub fn opacity(mut self, o: u8) -> Self {
        self.opacity = Some(o);
        self
    }

    /// Builder: replace the kind payload.
    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// True if the patch touches nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A node together with its ordered subtree.
///
/// Used for deep snapshots, for nested payloads of added nodes and as the persisted
/// document shape (`children` nested inside each node).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeTree {
    /// The node itself.
    #[serde(flatten)]
    pub node: Node,
    /// Ordered children.
    #[serde(default)]
    pub children: Vec<Self>,
}

impl NodeTree {
    /// A leaf tree.
    pub fn new(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Builder: append a child subtree.
    pub fn with_child(mut self, child: impl Into<Self>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Assign generated ids to every unset node, depth first.
    pub fn ensure_ids(&mut self) {
        self.node.ensure_id();
        for c in &mut self.children {
            c.ensure_ids();
        }
    }

    /// All ids in the tree, preorder.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids(&self, out: &mut Vec<NodeId>) {
        out.push(self.node.id.clone());
        for c in &self.children {
            c.collect_ids(out);
        }
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Self::len).sum::<usize>()
    }

    /// Always false; a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl From<Node> for NodeTree {
    fn from(node: Node) -> Self {
        Self::new(node)
    }
}
