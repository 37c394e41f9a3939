//! Report and remove, at most once per item and run.

use crate::context::RunContext;
use selfpromo_core::{CoreError, Item, Platform, Post};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Reported,
    Removed { notified: bool },
    /// Dry mode: the decision was logged, nothing was sent.
    DryRun,
    AlreadyActed,
    /// Someone else removed the item first.
    AlreadyRemoved,
}

pub struct ActionLayer<'a, P> {
    platform: &'a P,
}

impl<'a, P: Platform> ActionLayer<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    pub async fn report(
        &self,
        ctx: &mut RunContext,
        item: &Item,
        reason: &str,
    ) -> Result<ActionOutcome, CoreError> {
        if ctx.ledger.contains(item.id()) {
            return Ok(ActionOutcome::AlreadyActed);
        }

        if ctx.dry_run {
            info!("[dry run] Would report {}: {}", item.fullname(), reason);
            ctx.ledger.record(item.id());
            ctx.stats.dry_run_decisions += 1;
            return Ok(ActionOutcome::DryRun);
        }

        self.platform.report_item(item, reason).await?;
        ctx.ledger.record(item.id());
        ctx.stats.reports += 1;
        info!("Reported {} by u/{}: {}", item.fullname(), item.author(), reason);
        Ok(ActionOutcome::Reported)
    }

    /// Removes `post` unless it is already gone, then posts `notice` on it.
    /// A failed notice is logged and does not undo the removal.
    pub async fn remove(
        &self,
        ctx: &mut RunContext,
        post: &Post,
        mod_note: &str,
        notice: Option<&str>,
    ) -> Result<ActionOutcome, CoreError> {
        if ctx.ledger.contains(&post.id) {
            return Ok(ActionOutcome::AlreadyActed);
        }

        let current = self.platform.fetch_submission(&post.id).await?;
        if current.removed {
            info!("{} was already removed, nothing to do", post.fullname());
            ctx.ledger.record(&post.id);
            ctx.stats.races += 1;
            return Ok(ActionOutcome::AlreadyRemoved);
        }

        if ctx.dry_run {
            info!("[dry run] Would remove {}: {}", post.fullname(), mod_note);
            ctx.ledger.record(&post.id);
            ctx.stats.dry_run_decisions += 1;
            return Ok(ActionOutcome::DryRun);
        }

        let item = Item::Post(current);
        self.platform.remove_item(&item, mod_note).await?;
        ctx.ledger.record(&post.id);
        ctx.stats.removals += 1;
        info!("Removed {} by u/{}: {}", post.fullname(), post.author, mod_note);

        let notified = match notice {
            Some(message) => match self.platform.send_removal_notice(&item, message).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Removal notice on {} failed: {}", post.fullname(), e);
                    false
                }
            },
            None => false,
        };
        Ok(ActionOutcome::Removed { notified })
    }
}
