//! Poll loop: fetch the newest feed page, evaluate unseen items, sleep.

use chrono::Utc;
use moderation_engine::{Evaluation, Moderator, RunContext};
use selfpromo_core::{CoreError, ErrorExt, ErrorReporter, Options, Platform};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub fetched: usize,
    pub already_seen: usize,
    pub evaluated: usize,
    pub actions: usize,
    /// Transient failures, retried on the next poll.
    pub deferred: usize,
    pub failed: usize,
    pub pruned: usize,
}

pub struct BackgroundService<P> {
    moderator: Moderator<P>,
    area: String,
    page_size: usize,
    polling_interval: Duration,
    reporter: ErrorReporter,
}

impl<P: Platform> BackgroundService<P> {
    pub fn new(moderator: Moderator<P>, options: &Options) -> Self {
        Self {
            moderator,
            area: options.subreddit.clone(),
            page_size: options.posts_per_run,
            polling_interval: Duration::from_secs(options.interval_secs),
            reporter: ErrorReporter::new(),
        }
    }

    pub fn moderator(&self) -> &Moderator<P> {
        &self.moderator
    }

    /// Polls until `shutdown` turns true. The signal is only honoured between
    /// polls, a scan in progress always completes.
    pub async fn run(&self, ctx: &mut RunContext, mut shutdown: watch::Receiver<bool>) {
        let span = info_span!("run", run_id = %ctx.run_id);
        async {
            info!(
                "Watching r/{} every {:?}, {} items per poll{}",
                self.area,
                self.polling_interval,
                self.page_size,
                if ctx.dry_run { " (dry run)" } else { "" }
            );

            loop {
                if *shutdown.borrow() {
                    break;
                }

                match self.poll_once(ctx).await {
                    Ok(summary) => debug!("Poll finished: {:?}", summary),
                    Err(e) => {
                        ctx.stats.failed_polls += 1;
                        self.reporter.report_error(&e);
                    }
                }

                if sleep_or_shutdown(&mut shutdown, self.polling_interval).await {
                    break;
                }
            }

            info!(
                "Shutting down after {} polls (up since {}): {:?}",
                ctx.stats.polls, ctx.started_at, ctx.stats
            );
        }
        .instrument(span)
        .await
    }

    pub async fn poll_once(&self, ctx: &mut RunContext) -> Result<PollSummary, CoreError> {
        ctx.stats.polls += 1;
        let items = self
            .moderator
            .platform()
            .fetch_recent_feed_items(&self.area, self.page_size)
            .await?;

        let mut summary = PollSummary {
            fetched: items.len(),
            ..Default::default()
        };

        // Oldest first, so the recency set prunes in posting order
        for item in items.iter().rev() {
            if ctx.recency.contains(item.id()) {
                summary.already_seen += 1;
                continue;
            }
            ctx.stats.items_seen += 1;

            match self.moderator.evaluate(ctx, item, Utc::now()).await {
                Ok(evaluation) => {
                    if matches!(
                        evaluation,
                        Evaluation::Reported { .. } | Evaluation::Removed { .. }
                    ) {
                        summary.actions += 1;
                    }
                    summary.evaluated += 1;
                    ctx.recency.record(item.id());
                }
                Err(e) if e.is_retryable() => {
                    warn!("Deferring {} to the next poll", item.fullname());
                    self.reporter.report_warning(&e);
                    ctx.stats.evaluation_errors += 1;
                    summary.deferred += 1;
                }
                Err(e) => {
                    self.reporter.report_error(&e);
                    ctx.stats.evaluation_errors += 1;
                    ctx.recency.record(item.id());
                    summary.failed += 1;
                }
            }
        }

        summary.pruned = ctx.recency.prune();
        Ok(summary)
    }
}

/// Returns true when shutdown was requested during the sleep.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        _ = sleep(interval) => false,
        requested = shutdown.wait_for(|stop| *stop) => match requested {
            Ok(_) => true,
            Err(_) => {
                // Nobody can signal anymore, keep the regular cadence
                sleep(interval).await;
                false
            }
        },
    }
}

/// Receiver that turns true on Ctrl-C.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, finishing the current poll");
                let _ = tx.send(true);
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                // Keep the sender alive so the loop is not told to stop
                std::future::pending::<()>().await;
            }
        }
    });
    rx
}
