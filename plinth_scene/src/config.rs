// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene configuration.

use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Tunables shared by the store, the spatial grid and the history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    /// World size of one snap tile.
    pub tile_size: f64,
    /// Cell edge of the per-level broad-phase grid, in grid units.
    pub grid_cell_size: f64,
    /// Maximum number of undo entries kept.
    pub history_limit: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            tile_size: 0.5,
            grid_cell_size: 4.0,
            history_limit: 50,
        }
    }
}

impl SceneConfig {
    /// Parse and validate a JSON configuration. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject non-positive or non-finite sizes and a zero history limit.
    pub fn validate(&self) -> Result<(), SceneError> {
        for (name, v) in [
            ("tileSize", self.tile_size),
            ("gridCellSize", self.grid_cell_size),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(SceneError::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {v}"
                )));
            }
        }
        if self.history_limit == 0 {
            return Err(SceneError::InvalidConfig(
                "historyLimit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
