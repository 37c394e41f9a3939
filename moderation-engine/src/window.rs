//! Per-category repeat counter over a trailing time window.

use crate::stream::ActivityStream;
use chrono::{DateTime, Duration, Utc};
use selfpromo_core::{Item, Post};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowOutcome {
    /// Prior matching submissions inside the window.
    pub count: u32,
    /// Most recent prior match, cited when the limit is exceeded.
    pub evidence: Option<Post>,
    pub exceeded: bool,
}

/// Counts the author's earlier submissions matching `matches` that were
/// created within `window` of `now`.
///
/// `submissions` must be the author's submissions, newest first. The trigger
/// post and anything newer than it never count. Removed posts in `area` are
/// skipped, and the scan stops at the first submission older than the window
/// or as soon as the count exceeds `limit`.
pub fn count_in_window<F>(
    submissions: &ActivityStream,
    trigger: &Post,
    area: &str,
    matches: F,
    window: Duration,
    limit: u32,
    now: DateTime<Utc>,
) -> WindowOutcome
where
    F: Fn(&Post) -> bool,
{
    let mut outcome = WindowOutcome {
        count: 0,
        evidence: None,
        exceeded: false,
    };

    for item in submissions.iter() {
        let Item::Post(post) = item else {
            continue;
        };
        if post.id == trigger.id || post.created_utc > trigger.created_utc {
            continue;
        }
        if post.is_in_area(area) && post.removed {
            continue;
        }
        if now - post.created_utc > window {
            break;
        }
        if matches(post) {
            outcome.count += 1;
            if outcome.evidence.is_none() {
                outcome.evidence = Some(post.clone());
            }
            if outcome.count > limit {
                outcome.exceeded = true;
                break;
            }
        }
    }

    outcome
}
