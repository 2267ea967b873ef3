//! # crossfeed — relay a Telegram channel to an X account.
//!
//! Usage:
//!   crossfeed                       # run with ~/.crossfeed/config.toml
//!   crossfeed --config ./dev.toml   # explicit config path
//!   crossfeed --init                # write a default config and exit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use crossfeed_channels::TelegramChannel;
use crossfeed_core::RelayConfig;
use crossfeed_publisher::TwitterClient;
use crossfeed_relay::{Relay, engine};
use crossfeed_store::{HashLedger, PostQueue};

#[derive(Parser)]
#[command(
    name = "crossfeed",
    version,
    about = "Relay a Telegram channel to an X account"
)]
struct Cli {
    /// Config file path (default: ~/.crossfeed/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if cli.init {
        let config = RelayConfig::default();
        config.save()?;
        println!("Wrote {}", RelayConfig::default_path().display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => RelayConfig::load_from(path)?,
        None => RelayConfig::load()?,
    };
    if config.telegram.bot_token.is_empty() {
        bail!("Missing telegram.bot_token in config");
    }
    if config.telegram.admin_chat_id == 0 {
        bail!("Missing telegram.admin_chat_id in config");
    }
    if config.twitter.consumer_key.is_empty() {
        bail!("Missing twitter credentials in config");
    }

    let data_dir = config.relay.data_path();
    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(config.relay.spool_path())?;

    let queue = Arc::new(PostQueue::open(&data_dir.join("queue.db"))?);
    queue.recover_inflight()?;
    let ledger = HashLedger::load(&data_dir.join("posted_hashes.txt"))?;

    let sender = Arc::new(TelegramChannel::new(config.telegram.clone()));
    let me = sender
        .get_me()
        .await
        .context("Telegram connection check failed")?;
    tracing::info!(
        "Telegram bot: @{} ({})",
        me.username.as_deref().unwrap_or("unknown"),
        me.first_name
    );

    let twitter = Arc::new(TwitterClient::new(&config.twitter));
    let poller = TelegramChannel::new(config.telegram.clone());

    let relay = Relay::new(config, sender, twitter, queue, ledger);
    tokio::spawn(engine::run(relay.clone()));

    tracing::info!(
        "Watching @{} — relay running",
        relay.config.telegram.channel_username()
    );
    let mut updates = poller.start_polling();
    while let Some(update) = updates.next().await {
        relay.handle_update(update).await;
    }
    Ok(())
}
