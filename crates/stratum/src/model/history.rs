//! Undo/redo stacks of committed edits

use super::Edit;

/// Default number of edits kept on the undo stack
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Bounded undo and redo stacks
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<Edit>,
    redo: Vec<Edit>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Record a freshly committed edit; clears the redo stack
    pub fn record(&mut self, edit: Edit) {
        if self.limit == 0 {
            return;
        }
        self.redo.clear();
        self.undo.push(edit);
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Edit> {
        self.undo.pop()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Edit> {
        self.redo.pop()
    }

    pub(crate) fn push_redo(&mut self, edit: Edit) {
        self.redo.push(edit);
    }

    pub(crate) fn push_undo(&mut self, edit: Edit) {
        self.undo.push(edit);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of edits on the undo stack
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// The most recently committed edit
    pub fn last(&self) -> Option<&Edit> {
        self.undo.last()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellId, Change};

    fn edit(n: usize) -> Edit {
        let mut edit = Edit::new();
        edit.push(Change::VisibilityChanged {
            cell: CellId(n),
            visible: false,
        });
        edit
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(2);
        history.record(edit(1));
        history.record(edit(2));
        history.record(edit(3));
        assert_eq!(history.len(), 2);
        assert_eq!(history.pop_undo().unwrap().changes()[0].cell(), CellId(3));
        assert_eq!(history.pop_undo().unwrap().changes()[0].cell(), CellId(2));
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::default();
        history.record(edit(1));
        let undone = history.pop_undo().unwrap();
        history.push_redo(undone);
        assert!(history.can_redo());
        history.record(edit(2));
        assert!(!history.can_redo());
    }
}
