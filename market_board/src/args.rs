//! Command-line arguments for the market board.
//!
//! Every flag can also be set through an environment variable, so the API keys do not
//! have to appear on the command line. See `main` for end-to-end usage.
use std::time::Duration;

use clap::Parser;
use market_common::config::{
    ChangeSemantics, PRIMARY_BASE_URL, ProviderConfig, SECONDARY_BASE_URL, SyncConfig,
};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// API key of the primary (batched) provider.
    #[clap(long, env = "MARKET_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the primary provider.
    #[clap(long, env = "MARKET_PRIMARY_URL", default_value = PRIMARY_BASE_URL)]
    pub primary_url: String,

    /// API key of the per-symbol secondary provider; the fallback is off without it.
    #[clap(long, env = "MARKET_SECONDARY_API_KEY", hide_env_values = true)]
    pub secondary_api_key: Option<String>,

    /// Base URL of the secondary provider.
    #[clap(long, env = "MARKET_SECONDARY_URL", default_value = SECONDARY_BASE_URL)]
    pub secondary_url: String,

    /// Path to a text file restricting the board to some indices.
    /// Symbols may be separated by commas, spaces, or new lines.
    #[clap(long, env = "MARKET_SYMBOLS_FILE")]
    pub path: Option<String>,

    /// Viewport width in pixels.
    #[clap(long, env = "MARKET_VIEWPORT_WIDTH", default_value_t = 1280)]
    pub width: u32,

    /// Viewport height in pixels.
    #[clap(long, env = "MARKET_VIEWPORT_HEIGHT", default_value_t = 720)]
    pub height: u32,

    /// Background refresh interval, in seconds (at least 1).
    #[clap(
        long,
        env = "MARKET_REFRESH_SECS",
        default_value_t = 120,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_secs: u64,

    /// Cache freshness window, in seconds.
    #[clap(long, env = "MARKET_FRESHNESS_SECS", default_value_t = 15)]
    pub freshness_secs: u64,

    /// Per-request timeout, in seconds (at least 1).
    #[clap(
        long,
        env = "MARKET_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Automatic retries after a failed request.
    #[clap(long, env = "MARKET_RETRIES", default_value_t = 2)]
    pub retries: u32,

    /// Treat the primary `change` field as a percentage instead of an absolute delta.
    #[clap(long, env = "MARKET_CHANGE_IS_PERCENT")]
    pub change_is_percent: bool,

    /// Seed synthetic quotes so the first frame never waits on the network.
    #[clap(long)]
    pub preload_synthetic: bool,

    /// Exit after printing the first frame.
    #[clap(long)]
    pub once: bool,
}

impl Args {
    /// Sync configuration described by these arguments.
    pub fn sync_config(&self) -> SyncConfig {
        let semantics = if self.change_is_percent {
            ChangeSemantics::Percent
        } else {
            ChangeSemantics::AbsoluteDelta
        };
        let mut config = SyncConfig::new(self.api_key.trim())
            .with_primary_url(self.primary_url.trim())
            .with_refresh_interval(Duration::from_secs(self.refresh_secs))
            .with_freshness_window(Duration::from_secs(self.freshness_secs))
            .with_request_timeout(Duration::from_secs(self.timeout_secs))
            .with_retries(self.retries, market_common::config::RETRY_BASE_DELAY)
            .with_change_semantics(semantics);
        if let Some(key) = &self.secondary_api_key {
            config = config.with_secondary(ProviderConfig::new(self.secondary_url.trim(), key.trim()));
        }
        config
    }
}
