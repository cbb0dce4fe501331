//! Bounded FIFO buffer of diagnostic text from failed provisioning
//! attempts.
//!
//! The cache is the only evidence fed to remediation, and it is cleared
//! at well-defined points so that one repair cycle never reasons about
//! another cycle's failures.

use std::collections::VecDeque;

/// Default number of entries retained.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// Fixed-capacity ring buffer of failure diagnostics.
#[derive(Debug, Clone)]
pub struct LogCache {
    entries: VecDeque<String>,
    capacity: usize,
}

impl LogCache {
    /// Create a cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_LIMIT)
    }

    /// Create a cache holding at most `capacity` entries.
    ///
    /// A zero capacity is clamped to one entry so that a push is never
    /// silently dropped.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest if the cache is full.
    pub fn push(&mut self, entry: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Concatenate all entries, oldest first, for a remediation prompt.
    #[must_use]
    pub fn join(&self) -> String {
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for LogCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_join_preserve_order() {
        let mut cache = LogCache::new();
        cache.push("first");
        cache.push("second");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.join(), "first\nsecond");
    }

    #[test]
    fn test_eviction_is_fifo() {
        let mut cache = LogCache::with_capacity(3);
        for i in 0..5 {
            cache.push(format!("entry-{i}"));
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(
            cache.iter().collect::<Vec<_>>(),
            vec!["entry-2", "entry-3", "entry-4"]
        );
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = LogCache::with_capacity(10);
        for i in 0..200 {
            cache.push(format!("{i}"));
            assert!(cache.len() <= 10);
        }
    }

    #[test]
    fn test_clear() {
        let mut cache = LogCache::new();
        cache.push("AccessDenied");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.join(), "");
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = LogCache::with_capacity(0);
        cache.push("kept");
        assert_eq!(cache.len(), 1);
    }
}
