use crate::api::{RedditApiClient, UserHistoryKind};
use crate::auth::{RedditOAuth2Config, TokenManager};
use crate::metrics::ApiMetrics;
use crate::retry::{RetryConfig, RetryExecutor};
use selfpromo_core::{CoreError, Item, Platform, Post, RedditApiError};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Reddit implementation of the moderation platform.
pub struct RedditClient {
    api: RedditApiClient,
    tokens: TokenManager,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config, timeout: Duration) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(config.user_agent.clone(), timeout)?;
        let tokens = TokenManager::new(config, timeout)?;

        Ok(Self {
            api,
            tokens,
            retry: RetryExecutor::new(RetryConfig::reddit()),
        })
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.api.get_metrics().await
    }

    /// Runs `call` with a bearer token. A rejected token is dropped so the next
    /// attempt re-authenticates.
    async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, CoreError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let token = self.tokens.access_token().await?;
        let result = call(token).await;
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            self.tokens.invalidate().await;
        }
        result
    }

    /// Idempotent reads go through the retry executor.
    async fn read<T, F, Fut>(&self, operation_name: &str, call: F) -> Result<T, CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let call = &call;
        self.retry
            .execute(operation_name, move || self.authorized(call))
            .await
    }

    /// Writes are sent once. Only a 401, which guarantees Reddit did not act,
    /// is repeated with a fresh token.
    async fn write<F, Fut>(&self, call: F) -> Result<(), CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<(), CoreError>>,
    {
        match self.authorized(&call).await {
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Access token rejected during write, retrying once with a new token");
                self.authorized(&call).await
            }
            other => other,
        }
    }
}

impl Platform for RedditClient {
    async fn whoami(&self) -> Result<String, CoreError> {
        let api = &self.api;
        let user = self
            .read("me", move |token| async move { api.get_user_info(&token).await })
            .await?;
        Ok(user.name)
    }

    async fn fetch_recent_feed_items(
        &self,
        area: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        let api = &self.api;
        self.read("subreddit_new", move |token| async move {
            api.get_new_posts(&token, area, limit).await
        })
        .await
    }

    async fn fetch_author_activity(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        let api = &self.api;
        self.read("user_overview", move |token| async move {
            api.get_user_history(&token, author, UserHistoryKind::Overview, limit)
                .await
        })
        .await
    }

    async fn fetch_author_submissions(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        let api = &self.api;
        self.read("user_submitted", move |token| async move {
            api.get_user_history(&token, author, UserHistoryKind::Submitted, limit)
                .await
        })
        .await
    }

    async fn fetch_submission(&self, id: &str) -> Result<Post, CoreError> {
        let api = &self.api;
        self.read("info", move |token| async move {
            api.get_submission(&token, id).await
        })
        .await
    }

    async fn report_item(&self, item: &Item, reason: &str) -> Result<(), CoreError> {
        let api = &self.api;
        let fullname = item.fullname();
        let fullname = fullname.as_str();
        self.write(move |token| async move { api.report(&token, fullname, reason).await })
            .await
    }

    async fn remove_item(&self, item: &Item, mod_note: &str) -> Result<(), CoreError> {
        let api = &self.api;
        let fullname = item.fullname();
        let fullname = fullname.as_str();
        self.write(move |token| async move { api.remove(&token, fullname).await })
            .await?;

        // The removal already happened, a missing note is not worth failing over
        if let Err(e) = self
            .write(move |token| async move { api.add_removal_note(&token, fullname, mod_note).await })
            .await
        {
            warn!("Removed {} but could not attach the mod note: {}", fullname, e);
        }
        Ok(())
    }

    async fn send_removal_notice(&self, item: &Item, message: &str) -> Result<(), CoreError> {
        let api = &self.api;
        let fullname = item.fullname();
        let parent = fullname.as_str();

        let comment = self
            .authorized(move |token| async move { api.comment(&token, parent, message).await })
            .await?;
        let comment = comment.as_str();
        self.write(move |token| async move { api.distinguish(&token, comment, true).await })
            .await?;

        info!("Posted removal notice {} on {}", comment, parent);
        Ok(())
    }
}
