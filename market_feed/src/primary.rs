//! Batched primary provider client.
//!
//! One `GET {base}/stable/batch-index-quotes?apikey=KEY` (query values
//! percent-encoded) returns an array of
//! `{symbol, price, change, volume}` records covering every index the provider
//! tracks; records outside the catalog are dropped.

use log::{debug, info};
use market_common::catalog::{Catalog, QuoteSpec};
use market_common::config::{ChangeSemantics, ProviderConfig, SyncConfig};
use market_common::quote::{Provenance, QuoteValues};
use market_common::{MarketError, Quote, Result};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use crate::http::HttpFetcher;
use crate::provider::QuoteProvider;
use crate::shutdown::ShutdownSignal;

/// Raw record as returned by the primary provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryRecord {
    /// Provider symbol.
    pub symbol: String,
    /// Last price.
    #[serde(default)]
    pub price: Option<f64>,
    /// Change since the previous close.
    #[serde(default)]
    pub change: Option<f64>,
    /// Explicit percentage, when the endpoint reports one.
    #[serde(default)]
    pub changes_percentage: Option<f64>,
    /// Traded volume; some endpoints send it as a float.
    #[serde(default)]
    pub volume: Option<f64>,
}

impl PrimaryRecord {
    /// Percent change of this record.
    ///
    /// An explicit `changesPercentage` wins. Otherwise `change` is read according to
    /// `semantics`; an absolute delta is converted against the previous close
    /// (`price - change`), and a zero previous close yields 0.
    pub fn percent_change(&self, semantics: ChangeSemantics) -> f64 {
        if let Some(pct) = self.changes_percentage {
            return pct;
        }
        match (self.price, self.change, semantics) {
            (Some(price), Some(change), ChangeSemantics::AbsoluteDelta) => {
                let previous_close = price - change;
                if previous_close == 0.0 {
                    0.0
                } else {
                    change / previous_close * 100.0
                }
            }
            (_, Some(change), _) => change,
            _ => 0.0,
        }
    }

    fn values(&self, semantics: ChangeSemantics) -> QuoteValues {
        let volume = self
            .volume
            .filter(|v| v.is_finite() && *v > 0.0)
            .map(|v| v as u64)
            .unwrap_or(0);
        QuoteValues {
            price: self.price.filter(|p| p.is_finite()),
            change_percent: self.percent_change(semantics),
            volume,
        }
    }
}

/// Turn a decoded primary payload into catalog-ordered quotes.
///
/// Fails with `MalformedResponse` when the payload is not an array, is empty, or
/// contains no usable record for the catalog.
pub fn parse_batch(
    payload: Value,
    catalog: &Catalog,
    semantics: ChangeSemantics,
) -> Result<Vec<Quote>> {
    let Value::Array(items) = payload else {
        return Err(MarketError::MalformedResponse(
            "expected an array of quotes".into(),
        ));
    };
    if items.is_empty() {
        return Err(MarketError::MalformedResponse("empty quote array".into()));
    }

    let records: Vec<PrimaryRecord> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<PrimaryRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping unreadable record: {}", e);
                None
            }
        })
        .collect();

    let quotes: Vec<Quote> = catalog
        .iter()
        .filter_map(|spec| {
            let symbol = spec.symbol.to_string();
            records
                .iter()
                .find(|r| r.symbol == symbol)
                .map(|r| Quote::from_spec(spec, r.values(semantics), Provenance::Primary))
        })
        .collect();

    if quotes.is_empty() {
        return Err(MarketError::MalformedResponse(
            "no catalog symbols in response".into(),
        ));
    }
    Ok(quotes)
}

/// HTTP client for the primary provider.
#[derive(Debug, Clone)]
pub struct PrimaryClient {
    endpoint: ProviderConfig,
    semantics: ChangeSemantics,
    http: HttpFetcher,
}

impl PrimaryClient {
    /// Client for `config.primary`.
    pub fn new(config: &SyncConfig, shutdown: ShutdownSignal) -> Result<Self> {
        Ok(Self {
            endpoint: config.primary.clone(),
            semantics: config.change_semantics,
            http: HttpFetcher::new(config, shutdown)?,
        })
    }

    fn batch_url(&self) -> Result<Url> {
        let base = format!("{}/stable/batch-index-quotes", self.endpoint.base_url);
        Url::parse_with_params(&base, [("apikey", self.endpoint.api_key.as_str())])
            .map_err(|e| MarketError::Config(format!("primary URL {base}: {e}")))
    }

    fn quote_url(&self, spec: &QuoteSpec) -> Result<Url> {
        let base = format!("{}/api/v3/quote", self.endpoint.base_url);
        let mut url = Url::parse_with_params(&base, [("apikey", self.endpoint.api_key.as_str())])
            .map_err(|e| MarketError::Config(format!("primary URL {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| MarketError::Config(format!("primary URL {base} cannot take a path")))?
            .push(&spec.symbol.to_string());
        Ok(url)
    }
}

impl QuoteProvider for PrimaryClient {
    fn fetch_batch(&self, catalog: &Catalog, force_fresh: bool) -> Result<Vec<Quote>> {
        let payload = self.http.get_json(self.batch_url()?.as_str(), force_fresh)?;
        let quotes = parse_batch(payload, catalog, self.semantics)?;
        info!(
            "Primary provider returned {} of {} catalog quotes",
            quotes.len(),
            catalog.len()
        );
        Ok(quotes)
    }

    fn fetch_quote(&self, spec: &QuoteSpec) -> Result<Quote> {
        let payload = self.http.get_json(self.quote_url(spec)?.as_str(), true)?;
        let catalog = Catalog::from_symbols([spec.symbol]);
        // the single-quote endpoint reports `changesPercentage` directly
        let mut quotes = parse_batch(payload, &catalog, ChangeSemantics::Percent)?;
        quotes
            .pop()
            .ok_or_else(|| MarketError::MalformedResponse(format!("no quote for {}", spec.symbol)))
    }
}
