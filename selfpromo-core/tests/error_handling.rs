use selfpromo_core::{ConfigError, CoreError, ErrorExt, ErrorReporter, RedditApiError};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "auth.client_id".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let timeout = RedditApiError::RequestTimeout;
    assert_eq!(timeout.error_code(), "REDDIT_TIMEOUT");
    assert_eq!(CoreError::RedditApi(timeout).error_code(), "REDDIT_API");

    assert_eq!(
        RedditApiError::ActionRejected {
            action: "remove".to_string(),
            details: "NO_PERMISSION".to_string(),
        }
        .error_code(),
        "REDDIT_ACTION_REJECTED"
    );
}

#[test]
fn test_transient_failures_are_retryable() {
    let rate_limited =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(rate_limited.is_retryable());

    let timeout = CoreError::RedditApi(RedditApiError::RequestTimeout);
    assert!(timeout.is_retryable());

    let server = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert!(server.is_retryable());
}

#[test]
fn test_permanent_failures_are_not_retryable() {
    let config_error = CoreError::Config(ConfigError::ValidationFailed {
        reason: "duplicate category".to_string(),
    });
    assert!(!config_error.is_retryable());

    let forbidden = CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/api/remove".to_string(),
    });
    assert!(!forbidden.is_retryable());

    let auth = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "invalid_grant".to_string(),
    });
    assert!(!auth.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let timeout_error = CoreError::RedditApi(RedditApiError::RequestTimeout);
    assert_eq!(timeout_error.retry_after(), Some(Duration::from_secs(30)));

    let io_error = CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "reset"));
    assert_eq!(io_error.retry_after(), Some(Duration::from_secs(5)));

    let not_found = CoreError::NotFound {
        resource: "t3_abc".to_string(),
    };
    assert_eq!(not_found.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "options.subreddit".to_string(),
    });
    assert!(config_error
        .user_friendly_message()
        .contains("options.subreddit"));

    let forbidden = CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/api/remove".to_string(),
    });
    assert!(forbidden.user_friendly_message().contains("moderator"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);

    // Only checks that reporting does not panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
