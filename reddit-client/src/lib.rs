pub mod api;
pub mod auth;
pub mod client;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;


pub use api::{RedditApiClient, UserHistoryKind};
pub use auth::{AuthState, RedditOAuth2Config, RedditToken, TokenManager};
pub use client::RedditClient;
