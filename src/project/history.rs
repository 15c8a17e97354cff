use std::collections::VecDeque;

use crate::project::model::Layer;

pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Bounded undo/redo stacks of layer-list snapshots. Snapshots are
/// structurally independent clones; restoring one cannot be corrupted by
/// later edits. Pop on an empty stack is a no-op.
#[derive(Clone, Debug)]
pub struct EditHistory {
    undo: VecDeque<Vec<Layer>>,
    redo: Vec<Vec<Layer>>,
    depth: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl EditHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    /// Record the pre-mutation snapshot. Clears the redo stack; evicts the
    /// oldest undo entry past the depth bound.
    pub fn record(&mut self, before: Vec<Layer>) {
        self.undo.push_back(before);
        if self.undo.len() > self.depth {
            self.undo.pop_front();
        }
        self.redo.clear();
    }

    /// Swap `current` for the most recent undo snapshot. Returns `None` (and
    /// leaves state untouched) when there is nothing to undo.
    pub fn undo(&mut self, current: Vec<Layer>) -> Option<Vec<Layer>> {
        let restored = self.undo.pop_back()?;
        self.redo.push(current);
        Some(restored)
    }

    /// Mirror of [`EditHistory::undo`].
    pub fn redo(&mut self, current: Vec<Layer>) -> Option<Vec<Layer>> {
        let restored = self.redo.pop()?;
        self.undo.push_back(current);
        Some(restored)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}
