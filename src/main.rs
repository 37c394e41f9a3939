use anyhow::Context;
use background_service::{shutdown_on_ctrl_c, BackgroundService};
use clap::Parser;
use moderation_engine::{Moderator, RunContext};
use reddit_client::{RedditClient, RedditOAuth2Config};
use selfpromo_core::{AppConfig, Platform};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "selfpromo-guard",
    about = "Reports and removes excessive self-promotion in a subreddit",
    version
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "SELFPROMO_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Log decisions without reporting or removing anything
    #[arg(long)]
    dry_run: bool,

    /// Run a single poll and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let default_level = if config.options.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("Starting selfpromo-guard for r/{}", config.options.subreddit);

    let client = RedditClient::new(
        RedditOAuth2Config::from(&config.auth),
        Duration::from_secs(config.options.request_timeout_secs),
    )?;
    let account = client.whoami().await.context("authenticating with Reddit")?;
    tracing::info!("Logged in as u/{}", account);

    let dry_run = cli.dry_run || config.options.dry_run;
    let mut ctx = RunContext::new(config.options.posts_per_run, dry_run);
    let service = BackgroundService::new(
        Moderator::from_config(client, &config),
        &config.options,
    );

    if cli.once {
        let summary = service.poll_once(&mut ctx).await?;
        tracing::info!("Single poll finished: {:?}", summary);
    } else {
        service.run(&mut ctx, shutdown_on_ctrl_c()).await;
    }

    let metrics = service.moderator().platform().get_metrics().await;
    tracing::info!(
        "Reddit API: {} requests, {} failed, {} rate limited",
        metrics.total_requests,
        metrics.failed_requests,
        metrics.rate_limited_requests
    );
    Ok(())
}
