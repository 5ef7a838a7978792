mod bot;
mod config;
mod platform;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::config::Config;
use crate::platform::slack::SlackPlatform;
use crate::store::JokeStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,norrisbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bot name: {}", config.slack.bot_name);
    info!("  Database: {}", config.store.database_path.display());

    // A missing database is fatal: the joke table is seeded externally
    let store = JokeStore::open(&config.store.database_path)?;
    info!(
        "  Jokes available: {} ({} deliveries so far)",
        store.count_jokes().await?,
        store.total_usage().await?
    );

    let platform = Arc::new(SlackPlatform::new(config.slack.clone()));
    let bot = Bot::connect(platform.clone(), store, &config.slack.bot_name).await?;

    let (tx, rx) = mpsc::channel(32);
    let socket = tokio::spawn(async move { platform.run(tx).await });

    info!("Bot is starting...");
    bot.run(rx).await;

    // The event stream only ends when the socket loop gave up
    socket.await.context("Socket Mode task panicked")?
}
