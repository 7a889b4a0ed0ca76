//! Bounded, newest-first log of recent check results

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::probe::CheckResult;

/// How many check results are retained
pub const HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity log of check results, newest first
#[derive(Debug)]
pub struct StatusHistory {
    entries: VecDeque<CheckResult>,
    capacity: usize,
}

impl StatusHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a result at the front, evicting the oldest entry when full
    pub fn append(&mut self, result: CheckResult) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(result);
    }

    /// The current entries, newest first
    pub fn snapshot(&self) -> Vec<CheckResult> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-safe history handle: one writer (the check cycle), many readers
pub type HistoryHandle = Arc<RwLock<StatusHistory>>;

pub fn new_history_handle(capacity: usize) -> HistoryHandle {
    Arc::new(RwLock::new(StatusHistory::new(capacity)))
}
