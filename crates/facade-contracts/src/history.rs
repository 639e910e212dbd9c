use std::collections::VecDeque;

use crate::asset::ImageAsset;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bounded, most-recent-first stack of prior base images.
///
/// Pushing past capacity silently evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    entries: VecDeque<ImageAsset>,
    capacity: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl UndoHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, asset: ImageAsset) {
        self.entries.push_front(asset);
        self.entries.truncate(self.capacity);
    }

    pub fn pop(&mut self) -> Option<ImageAsset> {
        self.entries.pop_front()
    }

    pub fn peek(&self) -> Option<&ImageAsset> {
        self.entries.front()
    }

    pub fn count(&self) -> usize {
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

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|asset| asset.name.clone()).collect()
    }
}
