//! Blocking JSON GET with timeout and exponential-backoff retry.
//!
//! Only transport failures (timeouts, connection errors, HTTP 5xx) are retried. A 4xx
//! answer or a body that is not JSON is returned to the caller straight away, since
//! asking again would not change it. Backoff sleeps observe the shutdown signal.

use log::{debug, warn};
use market_common::config::SyncConfig;
use market_common::{MarketError, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::CACHE_CONTROL;
use serde_json::Value;
use std::time::Duration;

use crate::shutdown::ShutdownSignal;

/// Retry settings taken from `SyncConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `base_delay * 2^(attempt-1)` for the 1-based retry `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        }
    }
}

/// HTTP client shared by the provider clients.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    shutdown: ShutdownSignal,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeout and retry policy.
    pub fn new(config: &SyncConfig, shutdown: ShutdownSignal) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("market-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MarketError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry: RetryPolicy::from(config),
            shutdown,
        })
    }

    /// GET `url` and decode the body as JSON, retrying transport failures.
    ///
    /// `force_fresh` asks intermediaries to bypass their caches.
    pub fn get_json(&self, url: &str, force_fresh: bool) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.get_once(url, force_fresh) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Request to {} failed ({}); retry {}/{} in {:?}",
                        redact(url),
                        e,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    if !self.shutdown.sleep(delay) {
                        return Err(MarketError::ShutDown("retry cancelled".into()));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_once(&self, url: &str, force_fresh: bool) -> Result<Value> {
        debug!("GET {}", redact(url));
        let mut request = self.client.get(url);
        if force_fresh {
            request = request.header(CACHE_CONTROL, "no-cache");
        }
        let response = request
            .send()
            .map_err(|e| MarketError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(MarketError::Transport(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(rejected(status, url));
        }

        let body = response
            .text()
            .map_err(|e| MarketError::Transport(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| MarketError::MalformedResponse(format!("invalid JSON: {e}")))
    }
}

fn rejected(status: StatusCode, url: &str) -> MarketError {
    MarketError::Rejected {
        status: status.as_u16(),
        url: redact(url),
    }
}

/// Replace the value of an `apikey` query parameter with `***`.
pub fn redact(url: &str) -> String {
    match url.find("apikey=") {
        Some(start) => {
            let value_start = start + "apikey=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|i| value_start + i)
                .unwrap_or(url.len());
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}
