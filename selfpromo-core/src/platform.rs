//! Capabilities the moderation engine needs from the hosting platform.
//!
//! Every listing method returns items newest first. The engine re-checks the
//! ordering before it relies on it for early exits.

use crate::{CoreError, Item, Post};

pub trait Platform {
    /// Name of the account the bot acts as.
    async fn whoami(&self) -> Result<String, CoreError>;

    async fn fetch_recent_feed_items(
        &self,
        area: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError>;

    /// Mixed posts and comments.
    async fn fetch_author_activity(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError>;

    /// Posts only.
    async fn fetch_author_submissions(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError>;

    /// Current state of a single submission.
    async fn fetch_submission(&self, id: &str) -> Result<Post, CoreError>;

    async fn report_item(&self, item: &Item, reason: &str) -> Result<(), CoreError>;

    async fn remove_item(&self, item: &Item, mod_note: &str) -> Result<(), CoreError>;

    async fn send_removal_notice(&self, item: &Item, message: &str) -> Result<(), CoreError>;
}
