pub mod actions;
pub mod classifier;
pub mod context;
pub mod history;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod moderator;
pub mod recency;
pub mod stream;
pub mod window;

pub use actions::{ActionLayer, ActionOutcome};
pub use classifier::{
    CategoryRule, Classification, Classifier, Predicate, Rule, RuleSet, Verdict,
};
pub use context::{ActionLedger, RunContext, RunStats};
pub use history::{aggregate_history, HistoryTally};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryPlatform, RecordedWrite};
pub use moderator::{Evaluation, Moderator, ModeratorSettings};
pub use recency::RecencySet;
pub use stream::ActivityStream;
pub use window::{count_in_window, WindowOutcome};
