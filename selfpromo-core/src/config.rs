//! Bot configuration, loaded once from a TOML file and validated before the
//! poll loop starts. Everything is immutable afterwards.

use crate::ConfigError;
use chrono::Duration;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const CLIENT_SECRET_ENV: &str = "SELFPROMO_CLIENT_SECRET";
pub const PASSWORD_ENV: &str = "SELFPROMO_PASSWORD";

/// Largest page Reddit serves for listings.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub options: Options,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub user_agent: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Options {
    /// Monitored subreddit, without the `r/` prefix.
    pub subreddit: String,
    #[serde(default = "default_posts_per_run")]
    pub posts_per_run: usize,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Self-promotion ratio above which a post is reported.
    pub threshold: f64,
    /// Number of history items read per author.
    #[serde(default = "default_history")]
    pub history: usize,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_true")]
    pub notify_author: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Flairs that are never self-promotion, whatever the title or link says.
    pub excluded_flairs: Vec<String>,
    /// Flairs that mark original work when the post is a link.
    pub original_flairs: Vec<String>,
    pub original_markers: Vec<String>,
    pub authorship_phrases: Vec<String>,
    pub promotion_domains: Vec<String>,
    pub media_domains: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            excluded_flairs: strings(&["Question", "News", "Rewatch", "Official Media", "Clip"]),
            original_flairs: strings(&["Fanart", "Video Edit"]),
            original_markers: strings(&["[oc]", "(oc)", "{oc}", "original content"]),
            authorship_phrases: strings(&["i made", "i drew", "i edited", "my "]),
            promotion_domains: strings(&[
                "youtube.com",
                "youtu.be",
                "twitch.tv",
                "tiktok.com",
                "instagram.com",
                "twitter.com",
                "x.com",
                "pixiv.net",
                "deviantart.com",
                "artstation.com",
                "patreon.com",
                "ko-fi.com",
            ]),
            media_domains: strings(&[
                "i.redd.it",
                "v.redd.it",
                "imgur.com",
                "gfycat.com",
                "streamable.com",
                "redgifs.com",
            ]),
        }
    }
}

/// A flair whose posts are limited to `limit` per trailing window.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub flair: String,
    pub limit: u32,
    pub window: WindowSpec,
    /// Message posted on the removed item. Supports `{category}`, `{days}`
    /// and `{evidence}` placeholders.
    #[serde(default)]
    pub removal_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowSpec {
    #[serde(default)]
    pub days: u32,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
}

impl WindowSpec {
    pub const fn new(days: u32, hours: u32, minutes: u32) -> Self {
        Self {
            days,
            hours,
            minutes,
        }
    }

    pub fn to_duration(self) -> Duration {
        Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
    }

    /// Whole days, rounded up, for user-facing messages.
    pub fn rounded_days(self) -> u32 {
        if self.hours > 0 || self.minutes > 0 {
            self.days + 1
        } else {
            self.days
        }
    }
}

// Just under a week or a month so a post made exactly one period after the
// previous one is not caught by poll jitter.
const WEEK_WINDOW: WindowSpec = WindowSpec::new(6, 23, 45);
const MONTH_WINDOW: WindowSpec = WindowSpec::new(29, 23, 45);

fn default_categories() -> Vec<CategoryConfig> {
    [
        ("fanart", "Fanart", WEEK_WINDOW),
        ("clip", "Clip", MONTH_WINDOW),
        ("video edit", "Video Edit", MONTH_WINDOW),
        ("video", "Video", WEEK_WINDOW),
    ]
    .into_iter()
    .map(|(name, flair, window)| CategoryConfig {
        name: name.to_string(),
        flair: flair.to_string(),
        limit: 2,
        window,
        removal_message: None,
    })
    .collect()
}

fn default_posts_per_run() -> usize {
    25
}

fn default_interval_secs() -> u64 {
    60
}

fn default_history() -> usize {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl AppConfig {
    /// Reads, parses and validates the config file, then fills empty secrets
    /// from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::InvalidFormat {
                details: format!("{}: {}", path.display(), e),
            },
        })?;

        let mut config = Self::parse(&raw)?;
        config.resolve_secrets(|name| std::env::var(name).ok())?;
        debug!(
            "Loaded {} with {} categories",
            path.display(),
            config.categories.len()
        );
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn resolve_secrets<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (value, var_name) in [
            (&mut self.auth.client_secret, CLIENT_SECRET_ENV),
            (&mut self.auth.password, PASSWORD_ENV),
        ] {
            if value.is_empty() {
                *value = lookup(var_name).filter(|v| !v.is_empty()).ok_or_else(|| {
                    ConfigError::MissingEnvironmentVariable {
                        var_name: var_name.to_string(),
                    }
                })?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("auth.client_id", &self.auth.client_id),
            ("auth.username", &self.auth.username),
            ("auth.user_agent", &self.auth.user_agent),
            ("options.subreddit", &self.options.subreddit),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        let options = &self.options;
        if !options.threshold.is_finite() || !(0.0..=1.0).contains(&options.threshold) {
            return Err(ConfigError::InvalidValue {
                field: "options.threshold".to_string(),
                value: options.threshold.to_string(),
            });
        }
        for (field, value) in [
            ("options.posts_per_run", options.posts_per_run as u64),
            ("options.history", options.history as u64),
            ("options.interval_secs", options.interval_secs),
            ("options.request_timeout_secs", options.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        if options.posts_per_run > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "options.posts_per_run".to_string(),
                value: options.posts_per_run.to_string(),
            });
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            if !names.insert(category.name.to_lowercase()) {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("duplicate category '{}'", category.name),
                });
            }
            if category.flair.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: format!("categories.{}.flair", category.name),
                });
            }
            if category.window.to_duration() <= Duration::zero() {
                return Err(ConfigError::InvalidValue {
                    field: format!("categories.{}.window", category.name),
                    value: "0".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [auth]
        client_id = "id"
        client_secret = "secret"
        username = "guard-bot"
        password = "hunter2"
        user_agent = "selfpromo-guard/0.1 by u/guard-bot"

        [options]
        subreddit = "anime"
        threshold = 0.1
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.options.posts_per_run, 25);
        assert_eq!(config.options.history, 100);
        assert!(!config.options.dry_run);
        assert!(config.options.notify_author);
        assert_eq!(config.categories.len(), 4);
        assert!(config
            .classifier
            .excluded_flairs
            .contains(&"Question".to_string()));
    }

    #[test]
    fn test_default_windows_stop_short_of_round_numbers() {
        let config = AppConfig::parse(MINIMAL).unwrap();
        let fanart = &config.categories[0];
        assert_eq!(fanart.flair, "Fanart");
        assert_eq!(
            fanart.window.to_duration(),
            Duration::days(7) - Duration::minutes(15)
        );
        assert_eq!(fanart.window.rounded_days(), 7);
        let clip = &config.categories[1];
        assert_eq!(
            clip.window.to_duration(),
            Duration::days(30) - Duration::minutes(15)
        );
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let raw = MINIMAL.replace("threshold = 0.1", "threshold = 1.5");
        let err = AppConfig::parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "options.threshold"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let raw = MINIMAL.replace("threshold = 0.1", "threshold = 0.1\nposts_per_run = 0");
        assert!(AppConfig::parse(&raw).is_err());
    }

    #[test]
    fn test_page_size_above_listing_limit_rejected() {
        let raw = MINIMAL.replace("threshold = 0.1", "threshold = 0.1\nposts_per_run = 101");
        let err = AppConfig::parse(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, ref value }
            if field == "options.posts_per_run" && value == "101"));

        let raw = MINIMAL.replace("threshold = 0.1", "threshold = 0.1\nposts_per_run = 100");
        assert_eq!(AppConfig::parse(&raw).unwrap().options.posts_per_run, 100);
    }

    #[test]
    fn test_negative_limit_is_a_parse_error() {
        let raw = format!(
            "{}\n[[categories]]\nname = \"fanart\"\nflair = \"Fanart\"\nlimit = -1\nwindow = {{ days = 7 }}\n",
            MINIMAL
        );
        assert!(matches!(
            AppConfig::parse(&raw),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_duplicate_categories_rejected() {
        let category = "[[categories]]\nname = \"fanart\"\nflair = \"Fanart\"\nlimit = 1\nwindow = { days = 7 }\n";
        let raw = format!("{}\n{}\n{}", MINIMAL, category, category);
        assert!(matches!(
            AppConfig::parse(&raw),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn test_empty_window_rejected() {
        let raw = format!(
            "{}\n[[categories]]\nname = \"fanart\"\nflair = \"Fanart\"\nlimit = 1\nwindow = {{}}\n",
            MINIMAL
        );
        assert!(matches!(
            AppConfig::parse(&raw),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_secrets_from_environment() {
        let raw = MINIMAL
            .replace("client_secret = \"secret\"", "")
            .replace("password = \"hunter2\"", "");
        let mut config = AppConfig::parse(&raw).unwrap();
        config
            .resolve_secrets(|name| Some(format!("from-{}", name)))
            .unwrap();
        assert_eq!(config.auth.client_secret, "from-SELFPROMO_CLIENT_SECRET");
        assert_eq!(config.auth.password, "from-SELFPROMO_PASSWORD");

        let mut config = AppConfig::parse(&raw).unwrap();
        let err = config.resolve_secrets(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvironmentVariable { .. }));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::parse(MINIMAL).unwrap();
        let printed = format!("{:?}", config.auth);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
