// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plinth Scene: the editable document model of a building.
//!
//! A [`Scene`] owns a tree of typed nodes (sites, buildings, levels, walls, furnishing
//! items, groups, ...) and keeps a per-level [`SpatialGrid`] in step with it so placement
//! checks can run on every pointer move.
//!
//! - Nodes are identified by string [`NodeId`]s and reached through read-only
//!   [`NodeRef`] handles (`data()`, `parent()`, `children()`).
//! - Geometry is stored in the parent's frame. Only groups introduce a frame;
//!   [`Frame`] composes the chain when a node crosses a rotated group boundary.
//! - Every mutation validates containment up front and either applies completely or
//!   returns a [`SceneError`] without touching the tree.
//! - Subscribers receive a [`SceneChange`] after each mutation.
//!
//! Undo and redo live one layer up, in `plinth_history`.
//!
//! # Example
//!
//! ```rust
//! use kurbo::{Point, Rect, Size};
//! use plinth_scene::{Node, NodeKind, Scene};
//!
//! let mut scene = Scene::new();
//! scene.create(Node::new(NodeKind::Building {}), None).unwrap();
//! // A level without a parent goes into the building.
//! let level = scene.create(Node::new(NodeKind::level(0.0)), None).unwrap();
//!
//! let sofa = NodeKind::item("sofa", Point::new(2.0, 3.0), Size::new(1.0, 1.0));
//! let sofa = scene.create(Node::new(sofa), Some(&level)).unwrap();
//!
//! assert_eq!(scene.query(&level, Rect::new(2.0, 3.0, 3.0, 4.0)), vec![sofa]);
//! // Touching is fine, overlapping is not.
//! assert!(scene.can_place_item(&level, Rect::new(3.0, 3.0, 4.0, 4.0), None));
//! assert!(!scene.can_place_item(&level, Rect::new(2.5, 3.0, 3.5, 4.0), None));
//! ```

mod config;
mod document;
mod error;
mod grid;
mod placement;
mod scene;
mod transform;
mod types;

pub use config::SceneConfig;
pub use document::{DOCUMENT_VERSION, SceneDocument};
pub use error::SceneError;
pub use grid::SpatialGrid;
pub use placement::{CatalogItem, WALL_END_CLEARANCE, WallFixture, overlaps};
pub use scene::{NodeKey, NodeRef, Scene, SceneChange, SubscriptionId};
pub use transform::{Frame, grid_to_world, snap_to_grid, transform_rect_bbox, world_to_grid};
pub use types::{
    AttachmentMode, EditorState, KindTraits, Node, NodeId, NodeKind, NodePatch, NodeTree,
    NodeType, WallSide,
};
