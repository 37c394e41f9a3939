use crate::recency::RecencySet;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Ids of items acted on during this run.
#[derive(Debug, Clone, Default)]
pub struct ActionLedger {
    acted: HashSet<String>,
}

impl ActionLedger {
    pub fn contains(&self, id: &str) -> bool {
        self.acted.contains(id)
    }

    /// Returns false if the item was already in the ledger.
    pub fn record(&mut self, id: &str) -> bool {
        self.acted.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.acted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acted.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub polls: u64,
    pub failed_polls: u64,
    pub items_seen: u64,
    pub items_evaluated: u64,
    pub evaluation_errors: u64,
    pub reports: u64,
    pub removals: u64,
    pub dry_run_decisions: u64,
    pub races: u64,
}

/// State of one bot process. Nothing survives a restart.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub recency: RecencySet,
    pub ledger: ActionLedger,
    pub stats: RunStats,
}

impl RunContext {
    pub fn new(page_size: usize, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            dry_run,
            recency: RecencySet::for_page_size(page_size),
            ledger: ActionLedger::default(),
            stats: RunStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let ctx = RunContext::new(25, true);
        assert!(ctx.dry_run);
        assert_eq!(ctx.recency.capacity(), 75);
        assert!(ctx.ledger.is_empty());
        assert_eq!(ctx.stats, RunStats::default());
        assert_ne!(ctx.run_id, RunContext::new(25, true).run_id);
    }

    #[test]
    fn test_ledger_records_once() {
        let mut ledger = ActionLedger::default();
        assert!(ledger.record("abc"));
        assert!(!ledger.record("abc"));
        assert!(ledger.contains("abc"));
        assert_eq!(ledger.len(), 1);
    }
}
