//! Bounded linear undo/redo log of full snapshots.

use std::collections::VecDeque;

use thiserror::Error;

/// Default number of retained snapshots.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Undo/redo attempted past either end of the log. Non-fatal: nothing moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum HistoryBoundsError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Snapshot log with a cursor.
///
/// `entries[cursor]` is the state currently in effect; entries after it are
/// the redo branch and are dropped on the next `push`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History<T> {
    entries: VecDeque<T>,
    cursor: usize,
    capacity: usize,
}

impl<T> History<T> {
    /// A log seeded with the initial state. `capacity` counts snapshots
    /// including the seed and is clamped to at least 1.
    pub fn new(initial: T, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity);
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    pub fn undo(&mut self) -> Result<&T, HistoryBoundsError> {
        if self.cursor == 0 {
            return Err(HistoryBoundsError::NothingToUndo);
        }
        self.cursor -= 1;
        Ok(&self.entries[self.cursor])
    }

    pub fn redo(&mut self) -> Result<&T, HistoryBoundsError> {
        if self.cursor + 1 >= self.entries.len() {
            return Err(HistoryBoundsError::NothingToRedo);
        }
        self.cursor += 1;
        Ok(&self.entries[self.cursor])
    }

    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Steps available in each direction: `(undo, redo)`.
    pub fn depth(&self) -> (usize, usize) {
        (self.cursor, self.entries.len() - self.cursor - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
