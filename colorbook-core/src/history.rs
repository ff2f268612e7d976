//! Bounded undo history.
//!
//! Snapshots are appended after every committed change and popped on undo.
//! Once the capacity is exceeded the oldest entry is dropped. There is no redo.

use std::collections::VecDeque;

use tracing::trace;

/// Number of snapshots kept by [`History::new`].
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Serialized drawing-surface state. Opaque to the history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot(Vec<u8>);

impl Snapshot {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Snapshot {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct History<T = Snapshot> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// A history holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a snapshot, evicting the oldest one when over capacity.
    pub fn commit(&mut self, snapshot: T) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            trace!(capacity = self.capacity, "history full, evicted oldest snapshot");
        }
    }

    /// Remove and return the most recent snapshot, or `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    /// The most recent snapshot without removing it.
    pub fn peek(&self) -> Option<&T> {
        self.entries.back()
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

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}
