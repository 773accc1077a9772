//! Bounded ghost-trail history of past snapshots.

use crate::snapshot::Snapshot;
use std::collections::VecDeque;

/// Default number of snapshots retained (3 seconds at a 100ms cadence).
pub const HISTORY_CAPACITY: usize = 30;

/// Ring buffer for storing the N most recent snapshots.
///
/// Every entry is an owned copy taken at append time and there is no API to mutate it
/// afterwards, so later updates can never rewrite the trail.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    snapshots: VecDeque<Snapshot>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` snapshots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a copy of `snapshot`, evicting the oldest entry when full.
    pub fn append(&mut self, snapshot: &Snapshot) {
        if self.snapshots.len() >= self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot.clone());
    }

    /// Snapshot `k` positions behind the most recent one (`k = 0` is the most recent).
    /// `None` if the buffer is not that deep.
    pub fn read_from_most_recent(&self, k: usize) -> Option<&Snapshot> {
        let len = self.snapshots.len();
        if k >= len {
            return None;
        }
        self.snapshots.get(len - 1 - k)
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Snapshot> + ExactSizeIterator + '_ {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every retained snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
