//! Bounded linear undo/redo journal of on-air snapshots

use serde::Serialize;
use std::collections::VecDeque;

/// Default number of snapshots kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Immutable copy of the on-air content at the moment an action applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub title: String,
    pub leader: String,
    pub follower: String,
    pub without_pair: bool,
    pub hidden: bool,
    /// Short operator-facing description of the action
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySnapshot {
    pub items: Vec<HistoryEntry>,
    pub index: usize,
}

/// Journal with a cursor at the current entry.
///
/// Invariant: `index < entries.len()` whenever the log is non-empty.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    index: usize,
    capacity: usize,
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            index: 0,
            capacity,
        }
    }

    /// Append after the cursor, dropping any redo branch, then evict from
    /// the head while over capacity
    pub fn record(&mut self, entry: HistoryEntry) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push_back(entry);
        self.index = self.entries.len() - 1;

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.index = self.index.saturating_sub(1);
        }
    }

    /// Step back. `None` at the origin.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        if self.entries.is_empty() || self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.entries.get(self.index).cloned()
    }

    /// Step forward. `None` at the tail.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        self.entries.get(self.index).cloned()
    }

    #[cfg(test)]
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.index)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            items: self.entries.iter().cloned().collect(),
            index: self.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str) -> HistoryEntry {
        HistoryEntry {
            title: label.to_string(),
            leader: String::new(),
            follower: String::new(),
            without_pair: false,
            hidden: false,
            label: label.to_string(),
        }
    }

    fn labels(log: &HistoryLog) -> Vec<String> {
        log.snapshot().items.into_iter().map(|e| e.label).collect()
    }

    #[test]
    fn test_empty_log_bounds() {
        let mut log = HistoryLog::new(3);
        assert!(log.undo().is_none());
        assert!(log.redo().is_none());
        assert!(log.current().is_none());
    }

    #[test]
    fn test_undo_redo_walks_cursor() {
        let mut log = HistoryLog::new(10);
        log.record(entry("a"));
        log.record(entry("b"));
        log.record(entry("c"));

        assert_eq!(log.undo().unwrap().label, "b");
        assert_eq!(log.undo().unwrap().label, "a");
        assert!(log.undo().is_none());
        assert_eq!(log.index(), 0);

        assert_eq!(log.redo().unwrap().label, "b");
        assert_eq!(log.redo().unwrap().label, "c");
        assert!(log.redo().is_none());
    }

    #[test]
    fn test_new_branch_discards_redo() {
        let mut log = HistoryLog::new(10);
        log.record(entry("a"));
        log.record(entry("b"));
        log.record(entry("c"));
        log.undo();
        log.undo();
        log.record(entry("d"));

        assert_eq!(labels(&log), vec!["a", "d"]);
        assert_eq!(log.index(), 1);
        assert!(log.redo().is_none());
    }

    #[test]
    fn test_eviction_keeps_cursor_in_range() {
        let mut log = HistoryLog::new(3);
        for label in ["a", "b", "c", "d"] {
            log.record(entry(label));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(labels(&log), vec!["b", "c", "d"]);
        assert_eq!(log.index(), 2);

        assert_eq!(log.undo().unwrap().label, "c");
        assert_eq!(log.undo().unwrap().label, "b");
        assert!(log.undo().is_none());
        assert_eq!(log.current().unwrap().label, "b");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut log = HistoryLog::new(0);
        log.record(entry("a"));
        log.record(entry("b"));
        assert_eq!(log.capacity(), 1);
        assert_eq!(labels(&log), vec!["b"]);
    }
}
