//! Per-symbol secondary provider client.
//!
//! `GET {base}/query?function=GLOBAL_QUOTE&symbol=S&apikey=KEY` answers with
//! `{"Global Quote": {"05. price": "…", "06. volume": "…", "10. change percent": "1.23%"}}`.
//! Every field is a string; the percentage carries a literal `%`.

use market_common::catalog::QuoteSpec;
use market_common::config::{ProviderConfig, SyncConfig};
use market_common::quote::{Provenance, QuoteValues};
use market_common::{MarketError, Quote, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::http::HttpFetcher;
use crate::provider::SymbolProvider;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// Parse `"1.23%"` (or `"1.23"`) into `1.23`.
pub fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Turn one secondary payload into a quote for `spec`.
pub fn parse_global_quote(payload: Value, spec: &QuoteSpec) -> Result<Quote> {
    let envelope: Envelope = serde_json::from_value(payload)
        .map_err(|e| MarketError::MalformedResponse(e.to_string()))?;
    let quote = envelope
        .global_quote
        .ok_or_else(|| MarketError::MalformedResponse("missing \"Global Quote\"".into()))?;
    let change_percent = quote
        .change_percent
        .as_deref()
        .and_then(parse_percent)
        .ok_or_else(|| MarketError::MalformedResponse("missing change percent".into()))?;
    let price = quote
        .price
        .as_deref()
        .and_then(|p| p.trim().parse::<f64>().ok());
    let volume = quote
        .volume
        .as_deref()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    Ok(Quote::from_spec(
        spec,
        QuoteValues {
            price,
            change_percent,
            volume,
        },
        Provenance::Secondary,
    ))
}

/// HTTP client for the secondary provider.
#[derive(Debug, Clone)]
pub struct SecondaryClient {
    endpoint: ProviderConfig,
    http: HttpFetcher,
}

impl SecondaryClient {
    /// Client for `endpoint`, sharing timeout and retry settings with `config`.
    pub fn new(
        endpoint: ProviderConfig,
        config: &SyncConfig,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        Ok(Self {
            endpoint,
            http: HttpFetcher::new(config, shutdown)?,
        })
    }

    fn url(&self, spec: &QuoteSpec) -> Result<Url> {
        let base = format!("{}/query", self.endpoint.base_url);
        let symbol = spec.symbol.to_string();
        Url::parse_with_params(
            &base,
            [
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol.as_str()),
                ("apikey", self.endpoint.api_key.as_str()),
            ],
        )
        .map_err(|e| MarketError::Config(format!("secondary URL {base}: {e}")))
    }
}

impl SymbolProvider for SecondaryClient {
    fn fetch_symbol(&self, spec: &QuoteSpec) -> Result<Quote> {
        self.url(spec)
            .and_then(|url| self.http.get_json(url.as_str(), true))
            .and_then(|payload| parse_global_quote(payload, spec))
            .map_err(|e| MarketError::PerSymbol {
                symbol: spec.symbol.to_string(),
                reason: e.to_string(),
            })
    }
}
