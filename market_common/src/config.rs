//! Feed configuration: provider endpoints, credentials, cache and retry timings.
//!
//! Every tunable has a named default constant; deployments override them through the
//! `with_*` builders (the board binary maps CLI flags and environment variables onto
//! these).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default primary provider base URL.
pub const PRIMARY_BASE_URL: &str = "https://financialmodelingprep.com";
/// Default secondary provider base URL.
pub const SECONDARY_BASE_URL: &str = "https://www.alphavantage.co";
/// A cached batch younger than this is served without a network call.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(15);
/// Background refresh period.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(120);
/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Automatic retries after the first attempt.
pub const MAX_RETRIES: u32 = 2;
/// First backoff delay; doubles on every further retry.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
/// How long the changed-symbol set stays published after a refresh.
pub const TRANSITION_HOLD: Duration = Duration::from_millis(1500);

/// How the primary provider's `change` field is interpreted when no explicit
/// percentage is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChangeSemantics {
    /// `change` is an absolute delta; percent = `change / (price - change) * 100`.
    #[default]
    AbsoluteDelta,
    /// `change` is already a percentage.
    Percent,
}

/// Endpoint and credential of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Scheme + host (+ optional path prefix), without a trailing slash.
    pub base_url: String,
    /// API key sent as the `apikey` query parameter.
    pub api_key: String,
}

impl ProviderConfig {
    /// New provider config; a trailing `/` on `base_url` is dropped.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key: api_key.into(),
        }
    }
}

/// Complete configuration of the sync layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Batched primary provider.
    pub primary: ProviderConfig,
    /// Per-symbol secondary provider; `None` disables that fallback tier.
    pub secondary: Option<ProviderConfig>,
    /// See [`FRESHNESS_WINDOW`].
    pub freshness_window: Duration,
    /// See [`REFRESH_INTERVAL`].
    pub refresh_interval: Duration,
    /// See [`REQUEST_TIMEOUT`].
    pub request_timeout: Duration,
    /// See [`MAX_RETRIES`].
    pub max_retries: u32,
    /// See [`RETRY_BASE_DELAY`].
    pub retry_base_delay: Duration,
    /// See [`TRANSITION_HOLD`].
    pub transition_hold: Duration,
    /// See [`ChangeSemantics`].
    pub change_semantics: ChangeSemantics,
}

impl SyncConfig {
    /// Defaults with the given primary API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            primary: ProviderConfig::new(PRIMARY_BASE_URL, api_key),
            secondary: None,
            freshness_window: FRESHNESS_WINDOW,
            refresh_interval: REFRESH_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            retry_base_delay: RETRY_BASE_DELAY,
            transition_hold: TRANSITION_HOLD,
            change_semantics: ChangeSemantics::default(),
        }
    }

    /// Override the primary base URL.
    pub fn with_primary_url(mut self, base_url: impl Into<String>) -> Self {
        self.primary = ProviderConfig::new(base_url, self.primary.api_key);
        self
    }

    /// Enable the secondary provider.
    pub fn with_secondary(mut self, secondary: ProviderConfig) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Override the freshness window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Override the background refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Override the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override retry count and base backoff.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Override how long change highlights stay published.
    pub fn with_transition_hold(mut self, hold: Duration) -> Self {
        self.transition_hold = hold;
        self
    }

    /// Override the interpretation of the primary `change` field.
    pub fn with_change_semantics(mut self, semantics: ChangeSemantics) -> Self {
        self.change_semantics = semantics;
        self
    }
}
