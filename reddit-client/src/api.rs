use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header::HeaderMap, Client, Method, Response};
use selfpromo_core::{Comment, CoreError, Item, Post, RedditApiError, MAX_PAGE_SIZE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: String,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub link_flair_text: Option<String>,
    pub is_self: bool,
    #[serde(default)]
    pub is_original_content: bool,
    pub removed_by_category: Option<String>,
    pub banned_by: Option<Value>,
    pub removed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    pub author: String,
    #[serde(default)]
    pub body: String,
    pub subreddit: String,
    pub created_utc: f64,
    /// Fullname of the parent submission (`t3_...`).
    pub link_id: String,
    pub link_author: Option<String>,
    pub banned_by: Option<Value>,
    pub removed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
}

/// Body of write endpoints called with `api_type=json`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ApiJsonResponse {
    json: Option<ApiJsonBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiJsonBody {
    #[serde(default)]
    errors: Vec<Value>,
    data: Option<Value>,
}

/// `banned_by` is a moderator name, `true` for the spam filter, or null.
fn is_banned(banned_by: &Option<Value>) -> bool {
    match banned_by {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(name)) => !name.is_empty(),
        Some(_) => true,
    }
}

fn timestamp(created_utc: f64, id: &str) -> Result<DateTime<Utc>, RedditApiError> {
    Utc.timestamp_opt(created_utc.trunc() as i64, 0)
        .single()
        .ok_or_else(|| RedditApiError::InvalidResponse {
            details: format!("Invalid created_utc {} on {}", created_utc, id),
        })
}

impl TryFrom<RedditPostData> for Post {
    type Error = RedditApiError;

    fn try_from(data: RedditPostData) -> Result<Self, Self::Error> {
        let created_utc = timestamp(data.created_utc, &data.id)?;
        let removed = data.removed_by_category.is_some()
            || is_banned(&data.banned_by)
            || data.removed.unwrap_or(false);

        Ok(Self {
            id: data.id,
            author: data.author,
            created_utc,
            subreddit: data.subreddit,
            title: data.title,
            selftext: data.selftext,
            url: data.url,
            permalink: data.permalink,
            link_flair_text: data.link_flair_text,
            is_self: data.is_self,
            is_original_content: data.is_original_content,
            removed,
        })
    }
}

impl TryFrom<RedditCommentData> for Comment {
    type Error = RedditApiError;

    fn try_from(data: RedditCommentData) -> Result<Self, Self::Error> {
        let created_utc = timestamp(data.created_utc, &data.id)?;
        let removed = is_banned(&data.banned_by) || data.removed.unwrap_or(false);
        let link_id = data
            .link_id
            .strip_prefix("t3_")
            .unwrap_or(&data.link_id)
            .to_string();

        Ok(Self {
            id: data.id,
            author: data.author,
            created_utc,
            subreddit: data.subreddit,
            body: data.body,
            link_id,
            link_author: data.link_author,
            removed,
        })
    }
}

/// Converts a raw listing child. Kinds other than posts and comments are
/// logged and dropped.
pub fn item_from_child(child: RedditListingChild<Value>) -> Option<Item> {
    let converted = match child.kind.as_str() {
        "t3" => serde_json::from_value::<RedditPostData>(child.data)
            .map_err(|e| e.to_string())
            .and_then(|data| Post::try_from(data).map_err(|e| e.to_string()))
            .map(Item::Post),
        "t1" => serde_json::from_value::<RedditCommentData>(child.data)
            .map_err(|e| e.to_string())
            .and_then(|data| Comment::try_from(data).map_err(|e| e.to_string()))
            .map(Item::Comment),
        other => {
            warn!("Skipping unclassifiable listing item of kind '{}'", other);
            return None;
        }
    };

    match converted {
        Ok(item) => Some(item),
        Err(details) => {
            warn!("Skipping malformed {} item: {}", child.kind, details);
            None
        }
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    metrics: MetricsCollector,
    user_agent: String,
    base_url: Url,
}

impl RedditApiClient {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()?;
        let base_url = Url::parse(REDDIT_API_BASE).map_err(|e| CoreError::Internal {
            message: format!("Invalid API base URL: {}", e),
        })?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit_oauth()),
            metrics: MetricsCollector::new(),
            user_agent,
            base_url,
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        route: &'static str,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = self.base_url.join(endpoint).map_err(|e| CoreError::InvalidInput {
            message: format!("Invalid endpoint {}: {}", endpoint, e),
        })?;
        let start_time = Instant::now();

        self.rate_limiter.acquire().await;

        let mut request_builder = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .query(&[("raw_json", "1")]);
        if !query_params.is_empty() {
            request_builder = request_builder.query(query_params);
        }
        if let Some(form) = form {
            request_builder = request_builder.form(form);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let result = request_builder.send().await;

        let outcome = match result {
            Ok(response) => {
                self.rate_limiter
                    .update_from_headers(
                        header_value(response.headers(), "x-ratelimit-remaining"),
                        header_value(response.headers(), "x-ratelimit-reset"),
                    )
                    .await;
                Self::check_status(response, endpoint)
            }
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    Err(CoreError::RedditApi(RedditApiError::RequestTimeout))
                } else {
                    Err(CoreError::Network(e))
                }
            }
        };

        self.metrics
            .record_request(RequestMetrics {
                route,
                response_time: start_time.elapsed(),
                success: outcome.is_ok(),
                rate_limited: matches!(
                    outcome,
                    Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { .. }))
                ),
            })
            .await;

        outcome
    }

    fn check_status(response: Response, endpoint: &str) -> Result<Response, CoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let error = match status.as_u16() {
            429 => {
                let retry_after = header_value(response.headers(), "retry-after").unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }.into()
            }
            401 => RedditApiError::InvalidToken.into(),
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            }
            .into(),
            404 => CoreError::NotFound {
                resource: endpoint.to_string(),
            },
            code if status.is_server_error() => {
                RedditApiError::ServerError { status_code: code }.into()
            }
            code => RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", code, endpoint),
            }
            .into(),
        };
        Err(error)
    }

    async fn parse_json<T: DeserializeOwned>(
        response: Response,
        context: &str,
    ) -> Result<T, CoreError> {
        response.json().await.map_err(|e| {
            error!("Failed to parse {}: {}", context, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse {}", context),
            })
        })
    }

    async fn get_listing(
        &self,
        route: &'static str,
        endpoint: &str,
        access_token: &str,
        limit: usize,
        after: Option<&str>,
    ) -> Result<RedditListing<Value>, CoreError> {
        let limit_str = limit.min(MAX_PAGE_SIZE).to_string();
        let mut params = vec![("limit", limit_str.as_str()), ("sort", "new")];
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let response = self
            .make_request(Method::GET, route, endpoint, access_token, &params, None)
            .await?;
        Self::parse_json(response, endpoint).await
    }

    /// Sends a write request and surfaces errors Reddit reports inside a 200.
    async fn post_action(
        &self,
        route: &'static str,
        endpoint: &str,
        access_token: &str,
        form: &[(&str, &str)],
    ) -> Result<Option<Value>, CoreError> {
        let mut form = form.to_vec();
        form.push(("api_type", "json"));

        let response = self
            .make_request(Method::POST, route, endpoint, access_token, &[], Some(form.as_slice()))
            .await?;
        let body: ApiJsonResponse = Self::parse_json(response, endpoint).await?;
        let body = body.json.unwrap_or_default();

        if !body.errors.is_empty() {
            return Err(CoreError::RedditApi(RedditApiError::ActionRejected {
                action: route.to_string(),
                details: Value::Array(body.errors).to_string(),
            }));
        }
        Ok(body.data)
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let response = self
            .make_request(Method::GET, "me", "/api/v1/me", access_token, &[], None)
            .await?;

        let user_data: RedditUserData = Self::parse_json(response, "user data").await?;
        debug!("Retrieved user info for: {}", user_data.name);
        Ok(user_data)
    }

    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let listing = self
            .get_listing("subreddit_new", &endpoint, access_token, limit, None)
            .await
            .map_err(|e| match e {
                CoreError::NotFound { .. } => RedditApiError::SubredditNotFound {
                    subreddit: subreddit.to_string(),
                }
                .into(),
                other => other,
            })?;

        let items: Vec<Item> = listing
            .data
            .children
            .into_iter()
            .filter_map(item_from_child)
            .collect();
        debug!("Retrieved {} posts from r/{}", items.len(), subreddit);
        Ok(items)
    }

    /// Walks `/user/{name}/{kind}` page by page until `limit` items are read
    /// or the history ends.
    pub async fn get_user_history(
        &self,
        access_token: &str,
        username: &str,
        kind: UserHistoryKind,
        limit: usize,
    ) -> Result<Vec<Item>, CoreError> {
        let endpoint = format!("/user/{}/{}", username, kind.path());
        let mut items = Vec::with_capacity(limit.min(MAX_PAGE_SIZE));
        let mut after: Option<String> = None;
        let mut read = 0;

        while read < limit {
            let listing = self
                .get_listing(kind.route(), &endpoint, access_token, limit - read, after.as_deref())
                .await
                .map_err(|e| match e {
                    CoreError::NotFound { .. } | CoreError::RedditApi(RedditApiError::Forbidden { .. }) => {
                        RedditApiError::UserNotFound {
                            username: username.to_string(),
                        }
                        .into()
                    }
                    other => other,
                })?;

            let page_len = listing.data.children.len();
            read += page_len;
            items.extend(listing.data.children.into_iter().filter_map(item_from_child));

            after = listing.data.after;
            if page_len == 0 || after.is_none() {
                break;
            }
        }

        items.truncate(limit);
        debug!(
            "Read {} {} items for u/{}",
            items.len(),
            kind.path(),
            username
        );
        Ok(items)
    }

    pub async fn get_submission(&self, access_token: &str, id: &str) -> Result<Post, CoreError> {
        let fullname = format!("t3_{}", id.trim_start_matches("t3_"));
        let response = self
            .make_request(
                Method::GET,
                "info",
                "/api/info",
                access_token,
                &[("id", fullname.as_str())],
                None,
            )
            .await?;
        let listing: RedditListing<Value> = Self::parse_json(response, "submission info").await?;

        listing
            .data
            .children
            .into_iter()
            .find_map(|child| match item_from_child(child) {
                Some(Item::Post(post)) => Some(post),
                _ => None,
            })
            .ok_or_else(|| {
                RedditApiError::PostNotFound {
                    post_id: id.to_string(),
                }
                .into()
            })
    }

    pub async fn report(&self, access_token: &str, fullname: &str, reason: &str) -> Result<(), CoreError> {
        // Reddit truncates report reasons at 100 characters
        let reason: String = reason.chars().take(100).collect();
        self.post_action(
            "report",
            "/api/report",
            access_token,
            &[("thing_id", fullname), ("reason", reason.as_str())],
        )
        .await?;
        info!("Reported {}", fullname);
        Ok(())
    }

    pub async fn remove(&self, access_token: &str, fullname: &str) -> Result<(), CoreError> {
        self.post_action(
            "remove",
            "/api/remove",
            access_token,
            &[("id", fullname), ("spam", "false")],
        )
        .await?;
        info!("Removed {}", fullname);
        Ok(())
    }

    pub async fn add_removal_note(
        &self,
        access_token: &str,
        fullname: &str,
        note: &str,
    ) -> Result<(), CoreError> {
        let payload = serde_json::json!({
            "item_ids": [fullname],
            "mod_note": note,
            "reason_id": Value::Null,
        })
        .to_string();

        let form = [("json", payload.as_str())];
        self.make_request(
            Method::POST,
            "removal_reasons",
            "/api/v1/modactions/removal_reasons",
            access_token,
            &[],
            Some(form.as_slice()),
        )
        .await?;
        Ok(())
    }

    /// Posts a comment and returns its fullname.
    pub async fn comment(
        &self,
        access_token: &str,
        parent_fullname: &str,
        text: &str,
    ) -> Result<String, CoreError> {
        let data = self
            .post_action(
                "comment",
                "/api/comment",
                access_token,
                &[("thing_id", parent_fullname), ("text", text)],
            )
            .await?;

        data.as_ref()
            .and_then(|data| data.pointer("/things/0/data/name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RedditApiError::InvalidResponse {
                    details: "Comment response without a name".to_string(),
                }
                .into()
            })
    }

    pub async fn distinguish(&self, access_token: &str, fullname: &str, sticky: bool) -> Result<(), CoreError> {
        let sticky = if sticky { "true" } else { "false" };
        self.post_action(
            "distinguish",
            "/api/distinguish",
            access_token,
            &[("id", fullname), ("how", "yes"), ("sticky", sticky)],
        )
        .await?;
        Ok(())
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserHistoryKind {
    /// Posts and comments.
    Overview,
    Submitted,
}

impl UserHistoryKind {
    fn path(self) -> &'static str {
        match self {
            UserHistoryKind::Overview => "overview",
            UserHistoryKind::Submitted => "submitted",
        }
    }

    fn route(self) -> &'static str {
        match self {
            UserHistoryKind::Overview => "user_overview",
            UserHistoryKind::Submitted => "user_submitted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_json() -> Value {
        json!({
            "id": "test123",
            "title": "[OC] Drew Frieren",
            "selftext": "",
            "author": "test_user",
            "subreddit": "anime",
            "url": "https://i.redd.it/abc.png",
            "permalink": "/r/anime/comments/test123/oc_drew_frieren/",
            "created_utc": 1640995200.0,
            "link_flair_text": "Fanart",
            "is_self": false,
            "is_original_content": true,
            "removed_by_category": null,
            "banned_by": null,
            "score": 42
        })
    }

    fn comment_json() -> Value {
        json!({
            "id": "c1",
            "author": "test_user",
            "body": "Thanks everyone!",
            "subreddit": "anime",
            "created_utc": 1640995300.0,
            "link_id": "t3_test123",
            "link_author": "test_user",
            "banned_by": null
        })
    }

    #[tokio::test]
    async fn test_api_client_creation() {
        let client =
            RedditApiClient::new("test-user-agent/1.0".to_string(), Duration::from_secs(30))
                .unwrap();
        assert_eq!(client.user_agent(), "test-user-agent/1.0");

        let status = client.get_rate_limit_status().await;
        assert!(status.available_tokens > 0);
        assert_eq!(client.get_metrics().await.total_requests, 0);
    }

    #[test]
    fn test_post_conversion() {
        let child = RedditListingChild {
            kind: "t3".to_string(),
            data: post_json(),
        };
        let Some(Item::Post(post)) = item_from_child(child) else {
            panic!("expected a post");
        };
        assert_eq!(post.id, "test123");
        assert_eq!(post.link_flair_text.as_deref(), Some("Fanart"));
        assert!(post.is_original_content);
        assert!(!post.removed);
        assert_eq!(post.created_utc.timestamp(), 1640995200);
    }

    #[test]
    fn test_comment_conversion_strips_link_prefix() {
        let child = RedditListingChild {
            kind: "t1".to_string(),
            data: comment_json(),
        };
        let Some(Item::Comment(comment)) = item_from_child(child) else {
            panic!("expected a comment");
        };
        assert_eq!(comment.link_id, "test123");
        assert_eq!(comment.link_author.as_deref(), Some("test_user"));
    }

    #[test]
    fn test_removed_status_detection() {
        let mut by_mod = post_json();
        by_mod["removed_by_category"] = json!("moderator");
        let post = Post::try_from(serde_json::from_value::<RedditPostData>(by_mod).unwrap()).unwrap();
        assert!(post.removed);

        let mut by_filter = post_json();
        by_filter["banned_by"] = json!(true);
        let post =
            Post::try_from(serde_json::from_value::<RedditPostData>(by_filter).unwrap()).unwrap();
        assert!(post.removed);

        let mut comment = comment_json();
        comment["banned_by"] = json!("AutoModerator");
        let comment =
            Comment::try_from(serde_json::from_value::<RedditCommentData>(comment).unwrap())
                .unwrap();
        assert!(comment.removed);
    }

    #[test]
    fn test_unknown_kind_is_dropped() {
        let child = RedditListingChild {
            kind: "t5".to_string(),
            data: json!({"id": "sub"}),
        };
        assert!(item_from_child(child).is_none());
    }

    #[test]
    fn test_malformed_item_is_dropped() {
        let child = RedditListingChild {
            kind: "t3".to_string(),
            data: json!({"id": "broken"}),
        };
        assert!(item_from_child(child).is_none());
    }

    #[test]
    fn test_listing_deserialization() {
        let raw = json!({
            "kind": "Listing",
            "data": {
                "after": "t3_next",
                "before": null,
                "children": [
                    {"kind": "t3", "data": post_json()},
                    {"kind": "t1", "data": comment_json()}
                ]
            }
        });
        let listing: RedditListing<Value> = serde_json::from_value(raw).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_next"));
        let items: Vec<Item> = listing
            .data
            .children
            .into_iter()
            .filter_map(item_from_child)
            .collect();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_action_errors_are_read() {
        let body: ApiJsonResponse = serde_json::from_value(json!({
            "json": {"errors": [["NO_PERMISSION", "you are not a moderator", null]]}
        }))
        .unwrap();
        assert_eq!(body.json.unwrap().errors.len(), 1);
    }
}
