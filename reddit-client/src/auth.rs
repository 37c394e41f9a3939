//! OAuth2 for Reddit "script" apps: the bot account's own username and
//! password are exchanged for a bearer token (resource owner password grant).

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, ResourceOwnerPassword,
    ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use selfpromo_core::{AuthConfig, CoreError, RedditApiError};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens this close to expiry are replaced before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl RedditOAuth2Config {
    pub fn new(
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
        user_agent: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            username,
            password,
            user_agent,
        }
    }
}

impl From<&AuthConfig> for RedditOAuth2Config {
    fn from(auth: &AuthConfig) -> Self {
        Self::new(
            auth.client_id.clone(),
            auth.client_secret.clone(),
            auth.username.clone(),
            auth.password.clone(),
            auth.user_agent.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn needs_refresh(&self) -> bool {
        SystemTime::now() + REFRESH_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { token: RedditToken },
    TokenExpired { token: RedditToken },
}

pub struct TokenManager {
    config: RedditOAuth2Config,
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    token: Mutex<Option<RedditToken>>,
}

impl TokenManager {
    pub fn new(config: RedditOAuth2Config, timeout: Duration) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(AUTHORIZE_URL.to_string()).map_err(|e| CoreError::Internal {
            message: format!("Invalid authorize URL: {}", e),
        })?;
        let token_url = TokenUrl::new(TOKEN_URL.to_string()).map_err(|e| CoreError::Internal {
            message: format!("Invalid token URL: {}", e),
        })?;

        // Reddit answers token requests carrying the HTTP basic auth header
        // (the oauth2 default) and rejects anonymous user agents.
        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            config,
            oauth_client,
            http_client,
            token: Mutex::new(None),
        })
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        vec!["identity", "read", "history", "report", "modposts", "submit"]
    }

    /// Returns a valid bearer token, requesting a new one when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|token| !token.needs_refresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token after Reddit rejected it.
    pub async fn invalidate(&self) {
        debug!("Discarding rejected access token");
        *self.token.lock().await = None;
    }

    pub async fn set_token(&self, token: RedditToken) {
        *self.token.lock().await = Some(token);
    }

    pub async fn get_auth_state(&self) -> AuthState {
        match self.token.lock().await.clone() {
            None => AuthState::NotAuthenticated,
            Some(token) if token.needs_refresh() => AuthState::TokenExpired { token },
            Some(token) => AuthState::Authenticated { token },
        }
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        info!("Requesting Reddit access token for u/{}", self.config.username);
        let http_client = self.http_client.clone();

        let response = self
            .oauth_client
            .exchange_password(
                &ResourceOwnerUsername::new(self.config.username.clone()),
                &ResourceOwnerPassword::new(self.config.password.clone()),
            )
            .add_scopes(
                Self::get_required_scopes()
                    .into_iter()
                    .map(|scope| Scope::new(scope.to_string())),
            )
            .request_async(move |request| send_token_request(http_client, request))
            .await
            .map_err(|e| {
                error!("Token request failed: {}", e);
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let expires_in = response
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        debug!("Access token valid for {:?}", expires_in);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + expires_in,
            scope,
        })
    }
}

async fn send_token_request(
    http_client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http_client
        .request(request.method, request.url)
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
