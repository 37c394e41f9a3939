use std::collections::{HashSet, VecDeque};

/// Ids already evaluated during this run, oldest first.
///
/// Only the newest `3 × page_size` entries are kept. An item that drops out
/// has long left the first feed page, so it will not be fetched again.
#[derive(Debug, Clone)]
pub struct RecencySet {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl RecencySet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn for_page_size(page_size: usize) -> Self {
        Self::with_capacity(page_size.saturating_mul(3))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Appends `id` unless it is already present. Call [`prune`](Self::prune)
    /// once the page is done.
    pub fn record(&mut self, id: &str) {
        if self.members.insert(id.to_string()) {
            self.order.push_back(id.to_string());
        }
    }

    /// Drops the oldest entries until the set fits its capacity.
    pub fn prune(&mut self) -> usize {
        let mut dropped = 0;
        while self.order.len() > self.capacity {
            if let Some(id) = self.order.pop_front() {
                self.members.remove(&id);
                dropped += 1;
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_from_page_size() {
        assert_eq!(RecencySet::for_page_size(25).capacity(), 75);
    }

    #[test]
    fn test_prune_drops_oldest_first() {
        let mut recency = RecencySet::for_page_size(2);
        for id in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            recency.record(id);
        }
        assert_eq!(recency.len(), 8);

        assert_eq!(recency.prune(), 2);
        assert_eq!(recency.len(), 6);
        assert!(!recency.contains("a"));
        assert!(!recency.contains("b"));
        assert!(recency.contains("c"));
        assert!(recency.contains("h"));
    }

    #[test]
    fn test_duplicates_are_not_recorded_twice() {
        let mut recency = RecencySet::with_capacity(3);
        recency.record("a");
        recency.record("a");
        assert_eq!(recency.len(), 1);
        assert_eq!(recency.prune(), 0);
    }

    #[test]
    fn test_never_exceeds_capacity_after_prune() {
        let mut recency = RecencySet::for_page_size(4);
        for poll in 0..10 {
            for item in 0..4 {
                recency.record(&format!("{}-{}", poll, item));
            }
            recency.prune();
            assert!(recency.len() <= 12);
        }
        assert!(recency.contains("9-3"));
        assert!(!recency.contains("6-3"));
    }
}
