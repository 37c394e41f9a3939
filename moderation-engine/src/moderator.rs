//! Per-item decision: repeat limits first, then the self-promotion ratio.

use crate::actions::{ActionLayer, ActionOutcome};
use crate::classifier::{CategoryRule, Classification, Classifier};
use crate::context::RunContext;
use crate::history::aggregate_history;
use crate::stream::ActivityStream;
use crate::window::count_in_window;
use chrono::{DateTime, Utc};
use selfpromo_core::{AppConfig, CoreError, Item, Platform, Post};
use tracing::{debug, info};

pub const DEFAULT_REMOVAL_MESSAGE: &str = "Your post has been removed: you already shared \
{category} in this subreddit within the last {days} days. Previous post: {evidence}";

const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeratorSettings {
    pub threshold: f64,
    pub history: usize,
    pub notify_author: bool,
}

impl From<&AppConfig> for ModeratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            threshold: config.options.threshold,
            history: config.options.history,
            notify_author: config.options.notify_author,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Skipped { reason: &'static str },
    Clean { ratio: Option<f64> },
    Reported { ratio: f64, outcome: ActionOutcome },
    Removed {
        category: String,
        evidence: String,
        outcome: ActionOutcome,
    },
}

pub struct Moderator<P> {
    platform: P,
    classifier: Classifier,
    settings: ModeratorSettings,
}

impl<P: Platform> Moderator<P> {
    pub fn new(platform: P, classifier: Classifier, settings: ModeratorSettings) -> Self {
        Self {
            platform,
            classifier,
            settings,
        }
    }

    pub fn from_config(platform: P, config: &AppConfig) -> Self {
        let classifier = Classifier::new(
            &config.options.subreddit,
            &config.classifier,
            &config.categories,
        );
        Self::new(platform, classifier, ModeratorSettings::from(config))
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Evaluates one feed item and takes at most one action on it.
    pub async fn evaluate(
        &self,
        ctx: &mut RunContext,
        item: &Item,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, CoreError> {
        let post = match item {
            Item::Post(post) => post,
            Item::Comment(_) => return Ok(Evaluation::Skipped { reason: "comment" }),
        };
        if post.removed {
            return Ok(Evaluation::Skipped {
                reason: "already removed",
            });
        }
        if post.author == DELETED_AUTHOR {
            return Ok(Evaluation::Skipped {
                reason: "deleted author",
            });
        }
        if ctx.ledger.contains(&post.id) {
            return Ok(Evaluation::Skipped {
                reason: "already acted",
            });
        }

        ctx.stats.items_evaluated += 1;
        let classification = self.classifier.classify(post);
        debug!(
            "{} by u/{}: self-promotion={} ({}), categories={:?}",
            post.fullname(),
            post.author,
            classification.self_promotion,
            classification.decided_by.as_deref().unwrap_or("no rule"),
            classification.categories
        );

        if let Some(removed) = self.check_windows(ctx, post, &classification, now).await? {
            return Ok(removed);
        }

        if !classification.self_promotion {
            return Ok(Evaluation::Clean { ratio: None });
        }
        self.check_ratio(ctx, item, post).await
    }

    async fn check_windows(
        &self,
        ctx: &mut RunContext,
        post: &Post,
        classification: &Classification,
        now: DateTime<Utc>,
    ) -> Result<Option<Evaluation>, CoreError> {
        if classification.categories.is_empty() {
            return Ok(None);
        }

        let submissions = ActivityStream::from_fetched(
            self.platform
                .fetch_author_submissions(&post.author, self.settings.history)
                .await?,
        );

        for &index in &classification.categories {
            let category = &self.classifier.categories()[index];
            let outcome = count_in_window(
                &submissions,
                post,
                self.classifier.area(),
                |candidate| self.classifier.matches_category(candidate, category),
                category.window,
                category.limit,
                now,
            );
            debug!(
                "u/{} has {} prior {} posts within {} days (limit {})",
                post.author, outcome.count, category.name, category.window_days, category.limit
            );

            let evidence = match outcome.evidence {
                Some(evidence) if outcome.exceeded => evidence,
                _ => continue,
            };

            info!(
                "{} by u/{} exceeds the {} limit, previous post {}",
                post.fullname(),
                post.author,
                category.name,
                evidence.fullname()
            );
            let mod_note = format!(
                "Repeated {} within {} days (previous: {})",
                category.name, category.window_days, evidence.id
            );
            let notice = self
                .settings
                .notify_author
                .then(|| removal_message(category, &evidence));

            let outcome = ActionLayer::new(&self.platform)
                .remove(ctx, post, &mod_note, notice.as_deref())
                .await?;
            return Ok(Some(Evaluation::Removed {
                category: category.name.clone(),
                evidence: evidence.id,
                outcome,
            }));
        }

        Ok(None)
    }

    async fn check_ratio(
        &self,
        ctx: &mut RunContext,
        item: &Item,
        post: &Post,
    ) -> Result<Evaluation, CoreError> {
        let tally = aggregate_history(
            &self.platform,
            &self.classifier,
            &post.author,
            None,
            self.settings.history,
        )
        .await?;
        let ratio = tally.rounded_ratio();

        if tally.ratio() <= self.settings.threshold {
            return Ok(Evaluation::Clean { ratio: Some(ratio) });
        }

        info!(
            "u/{} self-promotion ratio {:.2} exceeds {:.2}",
            post.author, ratio, self.settings.threshold
        );
        let reason = format!("Possible excessive self-promotion (ratio: {:.2})", ratio);
        let outcome = ActionLayer::new(&self.platform)
            .report(ctx, item, &reason)
            .await?;
        Ok(Evaluation::Reported { ratio, outcome })
    }
}

/// Fills the category's removal template.
pub fn removal_message(category: &CategoryRule, evidence: &Post) -> String {
    let evidence_link = if evidence.permalink.is_empty() {
        evidence.fullname()
    } else {
        format!("https://www.reddit.com{}", evidence.permalink)
    };

    category
        .removal_message
        .as_deref()
        .unwrap_or(DEFAULT_REMOVAL_MESSAGE)
        .replace("{category}", &category.name)
        .replace("{days}", &category.window_days.to_string())
        .replace("{evidence}", &evidence_link)
}
