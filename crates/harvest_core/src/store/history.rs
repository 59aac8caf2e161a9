//! Bounded undo/redo of whole-document snapshots.

use crate::model::plantation::PlantationDocument;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct History {
    limit: usize,
    undo: VecDeque<PlantationDocument>,
    redo: Vec<PlantationDocument>,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            undo: VecDeque::new(),
            redo: Vec::new(),
        }
    }

    /// Stores the state before a mutation and drops the redo branch.
    pub fn record(&mut self, before: PlantationDocument) {
        self.undo.push_back(before);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        self.redo.clear();
    }

    /// Swaps `current` for the latest undo snapshot.
    pub fn undo(&mut self, current: PlantationDocument) -> Option<PlantationDocument> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Swaps `current` for the latest redo snapshot.
    pub fn redo(&mut self, current: PlantationDocument) -> Option<PlantationDocument> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }
}
