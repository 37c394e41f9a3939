//! In-memory [`Platform`] for exercising the engine without Reddit.

use selfpromo_core::{CoreError, Item, Platform, Post, RedditApiError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedWrite {
    Report { id: String, reason: String },
    Remove { id: String, mod_note: String },
    Notice { id: String, message: String },
}

#[derive(Debug, Default)]
pub struct MemoryPlatform {
    feed: Mutex<Vec<Item>>,
    activity: HashMap<String, Vec<Item>>,
    posts: Mutex<HashMap<String, Post>>,
    failing_authors: Mutex<HashMap<String, RedditApiError>>,
    writes: Mutex<Vec<RecordedWrite>>,
    reads: AtomicUsize,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, items: Vec<Item>) -> Self {
        self.set_feed(items);
        self
    }

    /// Registers an author's activity. Posts also become fetchable by id.
    pub fn with_history(mut self, author: &str, items: Vec<Item>) -> Self {
        if let Ok(mut posts) = self.posts.lock() {
            for item in &items {
                if let Item::Post(post) = item {
                    posts.insert(post.id.clone(), post.clone());
                }
            }
        }
        self.activity.insert(author.to_string(), items);
        self
    }

    pub fn with_post(self, post: Post) -> Self {
        if let Ok(mut posts) = self.posts.lock() {
            posts.insert(post.id.clone(), post);
        }
        self
    }

    /// History reads for `author` fail with `error`.
    pub fn with_failing_author(self, author: &str, error: RedditApiError) -> Self {
        if let Ok(mut failing) = self.failing_authors.lock() {
            failing.insert(author.to_string(), error);
        }
        self
    }

    pub fn set_feed(&self, items: Vec<Item>) {
        if let Ok(mut posts) = self.posts.lock() {
            for item in &items {
                if let Item::Post(post) = item {
                    posts.entry(post.id.clone()).or_insert_with(|| post.clone());
                }
            }
        }
        if let Ok(mut feed) = self.feed.lock() {
            *feed = items;
        }
    }

    pub fn heal_author(&self, author: &str) {
        if let Ok(mut failing) = self.failing_authors.lock() {
            failing.remove(author);
        }
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record(&self, write: RecordedWrite) -> Result<(), CoreError> {
        self.writes
            .lock()
            .map_err(|_| CoreError::Internal {
                message: "write log poisoned".to_string(),
            })?
            .push(write);
        Ok(())
    }

    fn history(&self, author: &str) -> Result<&[Item], CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failing_authors
            .lock()
            .ok()
            .and_then(|failing| failing.get(author).cloned());
        if let Some(error) = failure {
            return Err(CoreError::RedditApi(error));
        }
        Ok(self.activity.get(author).map(Vec::as_slice).unwrap_or(&[]))
    }
}

impl Platform for MemoryPlatform {
    async fn whoami(&self) -> Result<String, CoreError> {
        Ok("memory-bot".to_string())
    }

    async fn fetch_recent_feed_items(
        &self,
        _area: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let feed = self.feed.lock().map_err(|_| CoreError::Internal {
            message: "feed poisoned".to_string(),
        })?;
        Ok(feed.iter().take(limit).cloned().collect())
    }

    async fn fetch_author_activity(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        Ok(self.history(author)?.iter().take(limit).cloned().collect())
    }

    async fn fetch_author_submissions(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        Ok(self
            .history(author)?
            .iter()
            .filter(|item| matches!(item, Item::Post(_)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_submission(&self, id: &str) -> Result<Post, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let posts = self.posts.lock().map_err(|_| CoreError::Internal {
            message: "post store poisoned".to_string(),
        })?;
        posts.get(id).cloned().ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::PostNotFound {
                post_id: id.to_string(),
            })
        })
    }

    async fn report_item(&self, item: &Item, reason: &str) -> Result<(), CoreError> {
        self.record(RecordedWrite::Report {
            id: item.id().to_string(),
            reason: reason.to_string(),
        })
    }

    async fn remove_item(&self, item: &Item, mod_note: &str) -> Result<(), CoreError> {
        if let Ok(mut posts) = self.posts.lock() {
            if let Some(post) = posts.get_mut(item.id()) {
                post.removed = true;
            }
        }
        self.record(RecordedWrite::Remove {
            id: item.id().to_string(),
            mod_note: mod_note.to_string(),
        })
    }

    async fn send_removal_notice(&self, item: &Item, message: &str) -> Result<(), CoreError> {
        self.record(RecordedWrite::Notice {
            id: item.id().to_string(),
            message: message.to_string(),
        })
    }
}
