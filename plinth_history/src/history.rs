// Copyright 2025 the Plinth Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The undo/redo manager.

use std::collections::VecDeque;

use plinth_scene::{Scene, SceneError};

use crate::command::Command;
use crate::transaction::Transaction;

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Bounded undo and redo stacks of [`Command`]s, plus at most one open [`Transaction`].
///
/// The history does not own the scene; every call that mutates takes it explicitly.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<Box<dyn Command>>,
    redo: Vec<Box<dyn Command>>,
    limit: usize,
    active: Option<Transaction>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Empty history keeping [`DEFAULT_HISTORY_LIMIT`] steps.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Empty history keeping at most `limit` steps.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
            active: None,
        }
    }

    /// Empty history sized by the scene's configuration.
    pub fn for_scene(scene: &Scene) -> Self {
        Self::with_limit(scene.config().history_limit)
    }

    /// Maximum number of undo steps.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `command` and record it.
    ///
    /// An open transaction is committed first. A failed command leaves the scene and
    /// both stacks untouched. A successful one clears the redo stack and may evict the
    /// oldest undo step.
    pub fn execute(
        &mut self,
        scene: &mut Scene,
        command: impl Command + 'static,
    ) -> Result<(), SceneError> {
        self.commit_transaction(scene);
        let mut command = command;
        if let Err(error) = command.execute(scene) {
            tracing::warn!(command = command.label(), %error, "command refused");
            return Err(error);
        }
        tracing::debug!(command = command.label(), "executed");
        self.push(Box::new(command));
        Ok(())
    }

    fn push(&mut self, command: Box<dyn Command>) {
        self.undo.push_back(command);
        while self.undo.len() > self.limit {
            if let Some(evicted) = self.undo.pop_front() {
                tracing::trace!(command = evicted.label(), "evicted from history");
            }
        }
        self.redo.clear();
    }

    /// Undo the most recent step. Returns false if there was nothing to undo.
    ///
    /// With a transaction open, undo cancels it instead.
    pub fn undo(&mut self, scene: &mut Scene) -> bool {
        if self.active.is_some() {
            self.cancel_transaction(scene);
            return true;
        }
        let Some(mut command) = self.undo.pop_back() else {
            return false;
        };
        command.undo(scene);
        tracing::debug!(command = command.label(), "undone");
        self.redo.push(command);
        true
    }

    /// Redo the most recently undone step.
    ///
    /// Returns false if there was nothing to redo or the step could not be reapplied; a
    /// failed step stays on the redo stack.
    pub fn redo(&mut self, scene: &mut Scene) -> bool {
        if self.active.is_some() {
            return false;
        }
        let Some(mut command) = self.redo.pop() else {
            return false;
        };
        if let Err(error) = command.redo(scene) {
            // The scene is still in the undone state, so the step stays redoable.
            tracing::warn!(command = command.label(), %error, "redo failed");
            self.redo.push(command);
            return false;
        }
        tracing::debug!(command = command.label(), "redone");
        self.undo.push_back(command);
        true
    }

    /// Whether [`History::undo`] would do anything.
    pub fn can_undo(&self) -> bool {
        self.active.is_some() || !self.undo.is_empty()
    }

    /// Whether [`History::redo`] would do anything.
    pub fn can_redo(&self) -> bool {
        self.active.is_none() && !self.redo.is_empty()
    }

    /// Number of undo steps.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    /// Number of redo steps.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Label of the step [`History::undo`] would reverse.
    pub fn undo_label(&self) -> Option<&str> {
        match &self.active {
            Some(tx) => Some(tx.label()),
            None => self.undo.back().map(|c| c.label()),
        }
    }

    /// Label of the step [`History::redo`] would replay.
    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|c| c.label())
    }

    // --- transactions ---

    /// Open a transaction. An already open one is committed first, with a warning.
    pub fn start_transaction(&mut self, scene: &mut Scene, label: impl Into<String>) {
        if let Some(open) = &self.active {
            tracing::warn!(open = open.label(), "transaction already open; committing it");
            self.commit_transaction(scene);
        }
        self.active = Some(Transaction::new(label));
    }

    /// The open transaction, to record into.
    pub fn transaction(&mut self) -> Option<&mut Transaction> {
        self.active.as_mut()
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.active.is_some()
    }

    /// Seal the open transaction into one undo step. Empty transactions leave no step.
    pub fn commit_transaction(&mut self, scene: &mut Scene) {
        let Some(mut tx) = self.active.take() else {
            return;
        };
        if tx.is_empty() {
            tracing::debug!(transaction = tx.label(), "empty transaction dropped");
            return;
        }
        // Sealing only captures the final state and cannot fail.
        let _ = tx.execute(scene);
        tracing::debug!(transaction = tx.label(), "committed");
        self.push(Box::new(tx));
    }

    /// Roll the open transaction back and discard it.
    pub fn cancel_transaction(&mut self, scene: &mut Scene) {
        if let Some(tx) = self.active.take() {
            tx.rollback(scene);
            tracing::debug!(transaction = tx.label(), "cancelled");
        }
    }

    /// Forget every step. An open transaction is discarded without rollback.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.active = None;
    }

    /// Empty the scene and forget every step, as for loading a new document.
    pub fn reset(&mut self, scene: &mut Scene) {
        self.clear();
        scene.reset();
    }
}
