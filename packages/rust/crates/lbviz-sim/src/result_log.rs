//! Bounded, append-only log of outcome lines.

use std::collections::VecDeque;

use lbviz_types::ResultEntry;

/// Entries kept before the oldest ones are evicted.
pub const DEFAULT_RESULT_LOG_CAPACITY: usize = 1_000;

/// Ring buffer of [`ResultEntry`] values, oldest first.
#[derive(Debug, Clone)]
pub struct ResultLog {
    entries: VecDeque<ResultEntry>,
    capacity: usize,
    evicted: u64,
}

impl ResultLog {
    /// Log holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_RESULT_LOG_CAPACITY)),
            capacity,
            evicted: 0,
        }
    }

    /// Append, evicting the oldest entry when full. Returns the evicted entry.
    pub fn append(&mut self, entry: ResultEntry) -> Option<ResultEntry> {
        let evicted = if self.entries.len() >= self.capacity {
            self.evicted += 1;
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Drop every entry and reset the eviction counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.evicted = 0;
    }

    /// Entries in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ResultEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Iterate entries in append order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.iter()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped since the last clear.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RESULT_LOG_CAPACITY)
    }
}
