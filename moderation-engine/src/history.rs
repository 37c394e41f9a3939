//! Author history scan feeding the self-promotion ratio.

use crate::classifier::Classifier;
use crate::stream::ActivityStream;
use chrono::{DateTime, Utc};
use selfpromo_core::{Comment, CoreError, ErrorExt, Item, Platform};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryTally {
    pub selfpromo_posts: u32,
    pub other_posts: u32,
    pub selfpromo_comments: u32,
    pub other_comments: u32,
    /// Replies by the author under their own self-promotional post.
    pub ignored_self_comments: u32,
    pub skipped_removed: u32,
    pub outside_area: u32,
    pub scanned: u32,
}

impl HistoryTally {
    /// Self-promotion posts over all posts plus non-promotional comments.
    /// Self-promotion comments stay out of the denominator.
    pub fn ratio(&self) -> f64 {
        let denominator = self.selfpromo_posts + self.other_posts + self.other_comments;
        if denominator == 0 {
            return 0.0;
        }
        f64::from(self.selfpromo_posts) / f64::from(denominator)
    }

    pub fn rounded_ratio(&self) -> f64 {
        (self.ratio() * 100.0).round() / 100.0
    }
}

/// Scans up to `max_items` of the author's recent activity, stopping at the
/// first item older than `since`.
pub async fn aggregate_history<P: Platform>(
    platform: &P,
    classifier: &Classifier,
    author: &str,
    since: Option<DateTime<Utc>>,
    max_items: usize,
) -> Result<HistoryTally, CoreError> {
    let stream = ActivityStream::from_fetched(platform.fetch_author_activity(author, max_items).await?);
    let area = classifier.area();
    let mut tally = HistoryTally::default();
    // Parent submission id -> is self-promotion
    let mut parents: HashMap<String, bool> = HashMap::new();

    for item in stream.iter().take(max_items) {
        if since.map_or(false, |checkpoint| item.created_utc() < checkpoint) {
            break;
        }
        tally.scanned += 1;

        if !item.is_in_area(area) {
            tally.outside_area += 1;
            match item {
                Item::Post(_) => tally.other_posts += 1,
                Item::Comment(_) => tally.other_comments += 1,
            }
            continue;
        }
        if item.is_removed() {
            tally.skipped_removed += 1;
            continue;
        }

        match item {
            Item::Post(post) => {
                if classifier.is_self_promotion(post) {
                    tally.selfpromo_posts += 1;
                } else {
                    tally.other_posts += 1;
                }
            }
            Item::Comment(comment) => {
                if replies_to_own_promotion(platform, classifier, comment, &mut parents).await? {
                    tally.ignored_self_comments += 1;
                } else if classifier.is_self_promotion_comment(comment) {
                    tally.selfpromo_comments += 1;
                } else {
                    tally.other_comments += 1;
                }
            }
        }
    }

    debug!("History of u/{}: {:?} (ratio {:.2})", author, tally, tally.ratio());
    Ok(tally)
}

async fn replies_to_own_promotion<P: Platform>(
    platform: &P,
    classifier: &Classifier,
    comment: &Comment,
    parents: &mut HashMap<String, bool>,
) -> Result<bool, CoreError> {
    let own_thread = comment
        .link_author
        .as_deref()
        .map_or(false, |parent_author| parent_author.eq_ignore_ascii_case(&comment.author));
    if !own_thread {
        return Ok(false);
    }

    if let Some(&promotional) = parents.get(&comment.link_id) {
        return Ok(promotional);
    }
    let promotional = match platform.fetch_submission(&comment.link_id).await {
        Ok(parent) => classifier.is_self_promotion(&parent),
        Err(e) if e.is_retryable() => return Err(e),
        Err(e) => {
            warn!(
                "Parent t3_{} of comment {} unavailable, counting the comment normally: {}",
                comment.link_id, comment.id, e
            );
            false
        }
    };
    parents.insert(comment.link_id.clone(), promotional);
    Ok(promotional)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_excludes_promotional_comments() {
        let tally = HistoryTally {
            selfpromo_posts: 4,
            other_posts: 2,
            selfpromo_comments: 10,
            ..Default::default()
        };
        assert!((tally.ratio() - 4.0 / 6.0).abs() < f64::EPSILON);
        assert_eq!(tally.rounded_ratio(), 0.67);
    }

    #[test]
    fn test_zero_denominator_is_zero() {
        assert_eq!(HistoryTally::default().ratio(), 0.0);

        let only_comments = HistoryTally {
            selfpromo_comments: 3,
            ignored_self_comments: 2,
            ..Default::default()
        };
        assert_eq!(only_comments.ratio(), 0.0);
    }

    #[test]
    fn test_other_comments_dilute_ratio() {
        let tally = HistoryTally {
            selfpromo_posts: 1,
            other_comments: 3,
            ..Default::default()
        };
        assert_eq!(tally.ratio(), 0.25);
    }
}
