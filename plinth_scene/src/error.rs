// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type for scene operations.

use thiserror::Error;

use crate::types::{NodeId, NodeType};

/// Why a scene operation was refused.
///
/// A refused operation never leaves a partial mutation behind.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The parent is missing or cannot contain the child's type.
    #[error(
        "a {child} node cannot be placed under {}",
        .parent.as_ref().map_or("the root", NodeId::as_str)
    )]
    InvalidParent {
        /// Type of the rejected child.
        child: NodeType,
        /// Requested parent, `None` for the root.
        parent: Option<NodeId>,
    },
    /// The id does not name a live node.
    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),
    /// The id is already used by another node.
    #[error("node id `{0}` is already in use")]
    DuplicateId(NodeId),
    /// A level was added without a parent and there is no building to hold it.
    #[error("cannot add a level: the scene has no building")]
    NoBuilding,
    /// The move would place a node inside its own subtree.
    #[error("moving `{node}` under `{parent}` would create a cycle")]
    Cycle {
        /// Node being moved.
        node: NodeId,
        /// Requested new parent.
        parent: NodeId,
    },
    /// A selected node cannot be wrapped in a group.
    #[error("`{id}` is a {kind} node and cannot be grouped")]
    NotGroupable {
        /// Offending node.
        id: NodeId,
        /// Its type.
        kind: NodeType,
    },
    /// The selection spans more than one parent.
    #[error("selected nodes do not share a parent")]
    MixedParents,
    /// The selection is empty.
    #[error("nothing selected")]
    EmptySelection,
    /// The node is not a group.
    #[error("`{0}` is not a group")]
    NotAGroup(NodeId),
    /// A requested child order is not a permutation of the current children.
    #[error("new child order for `{0}` is not a permutation of its children")]
    InvalidOrder(NodeId),
    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A document was written by an unknown format version.
    #[error("unsupported document version {0}")]
    UnsupportedVersion(u32),
    /// A document or configuration failed to parse or serialize.
    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),
    /// The store's internal bookkeeping disagrees with itself.
    #[error("scene invariant violated: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_parent_reads_naturally() {
        let err = SceneError::InvalidParent {
            child: NodeType::Wall,
            parent: None,
        };
        assert_eq!(err.to_string(), "a wall node cannot be placed under the root");
        let err = SceneError::InvalidParent {
            child: NodeType::Level,
            parent: Some(NodeId::new("site_1")),
        };
        assert_eq!(err.to_string(), "a level node cannot be placed under site_1");
    }
}
