// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persisted document: the node tree as plain nested JSON.

use serde::{Deserialize, Serialize};

use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::scene::Scene;
use crate::types::NodeTree;

/// Format version written by [`Scene::to_document`].
pub const DOCUMENT_VERSION: u32 = 1;

/// A saved scene: every root with its children nested inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    /// Format version.
    pub version: u32,
    /// Root subtrees in order.
    pub nodes: Vec<NodeTree>,
}

impl Scene {
    /// Capture the scene as a document. Editor-only state is not included.
    pub fn to_document(&self) -> SceneDocument {
        SceneDocument {
            version: DOCUMENT_VERSION,
            nodes: self.snapshot_roots(),
        }
    }

    /// Build a scene from a document, keeping ids, order and fields verbatim.
    ///
    /// Nesting is authoritative: `parentId` values in the document are rewritten from it.
    pub fn from_document(doc: &SceneDocument, config: SceneConfig) -> Result<Self, SceneError> {
        if doc.version != DOCUMENT_VERSION {
            return Err(SceneError::UnsupportedVersion(doc.version));
        }
        let mut scene = Self::with_config(config)?;
        for root in &doc.nodes {
            let _ = scene.create_root_tree(root)?;
        }
        tracing::debug!(nodes = scene.len(), "document loaded");
        Ok(scene)
    }

    /// Serialize to compact JSON.
    pub fn to_json_string(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, SceneError> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Parse JSON produced by [`Scene::to_json_string`].
    pub fn from_json_str(text: &str, config: SceneConfig) -> Result<Self, SceneError> {
        let doc: SceneDocument = serde_json::from_str(text)?;
        Self::from_document(&doc, config)
    }
}
