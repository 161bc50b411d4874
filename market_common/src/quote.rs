//! Quote data model.
//!
//! A `Quote` is derived from a catalog `QuoteSpec` plus the values observed from a
//! provider (or synthesized). It is never mutated after construction; each refresh
//! produces a whole new `QuoteBatch`.

use std::ops::Deref;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::{Catalog, GeoPoint, IndexSymbol, QuoteSpec};

/// Where a quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Batched call to the primary provider.
    Primary,
    /// Per-symbol call to the secondary provider.
    Secondary,
    /// Generated locally when no provider is reachable.
    Synthetic,
}

/// Marker color, derived from the direction of the move only.
///
/// Up is red and down is green.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Color {
    /// Percent change >= 0.
    Up,
    /// Percent change < 0.
    Down,
    /// Error entries with no meaningful direction.
    Neutral,
}

impl Color {
    /// Hex color for the presentation layer.
    pub fn hex(self) -> &'static str {
        match self {
            Color::Up => "#f44336",
            Color::Down => "#4caf50",
            Color::Neutral => "#999999",
        }
    }

    /// Color for a direction flag.
    pub fn for_direction(is_positive: bool) -> Self {
        if is_positive { Color::Up } else { Color::Down }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.hex().to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "#f44336" => Ok(Color::Up),
            "#4caf50" => Ok(Color::Down),
            "#999999" => Ok(Color::Neutral),
            other => Err(format!("unknown marker color {other}")),
        }
    }
}

/// Values observed for one symbol, before they are attached to catalog metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteValues {
    /// Last price, if the provider reported one.
    pub price: Option<f64>,
    /// Percent change; rounded to 2 decimals when the quote is built.
    pub change_percent: f64,
    /// Traded volume.
    pub volume: u64,
}

/// Round to the fixed 2-decimal precision quotes carry.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Market quote for a single index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Catalog key.
    pub symbol: IndexSymbol,
    /// Short label.
    pub display_name: String,
    /// Human-readable name.
    pub name: String,
    /// Geographic anchor copied from the catalog.
    pub anchor: GeoPoint,
    /// Last price; absent when the provider did not report one.
    pub price: Option<f64>,
    /// Percent change, 2-decimal precision.
    pub change_percent: f64,
    /// `change_percent >= 0`.
    pub is_positive: bool,
    /// Marker color derived from `is_positive` (neutral for error entries).
    pub color: Color,
    /// Traded volume, 0 when unknown.
    pub volume: u64,
    /// Origin of the values.
    pub source: Provenance,
    /// Set on placeholder entries for symbols the provider failed to deliver.
    pub is_error: bool,
    /// Observation time, UTC milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Quote {
    /// Build a quote from catalog metadata and observed values.
    ///
    /// Only the documented `QuoteSpec` fields are copied.
    pub fn from_spec(spec: &QuoteSpec, values: QuoteValues, source: Provenance) -> Self {
        let change_percent = round2(values.change_percent);
        let change_percent = if change_percent == 0.0 { 0.0 } else { change_percent };
        let is_positive = change_percent >= 0.0;
        Self {
            symbol: spec.symbol,
            display_name: spec.display_name.to_string(),
            name: spec.name.to_string(),
            anchor: spec.anchor,
            price: values.price,
            change_percent,
            is_positive,
            color: Color::for_direction(is_positive),
            volume: values.volume,
            source,
            is_error: false,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Zero-valued, neutrally colored, error-flagged placeholder for a failed symbol.
    pub fn unavailable(spec: &QuoteSpec, source: Provenance) -> Self {
        let values = QuoteValues {
            price: Some(0.0),
            change_percent: 0.0,
            volume: 0,
        };
        Self {
            is_positive: false,
            color: Color::Neutral,
            is_error: true,
            ..Self::from_spec(spec, values, source)
        }
    }

    /// Random quote for development and last-resort fallback.
    ///
    /// Percent change is uniform in `[-2, 2]`, price an integer in `[1000, 6000)`,
    /// volume 0.
    pub fn synthetic<R: Rng + ?Sized>(spec: &QuoteSpec, rng: &mut R) -> Self {
        let values = QuoteValues {
            price: Some(rng.random_range(1000..6000) as f64),
            change_percent: rng.random_range(-2.0..=2.0),
            volume: 0,
        };
        Self::from_spec(spec, values, Provenance::Synthetic)
    }
}

/// Immutable, shared batch of quotes for the whole catalog.
///
/// Clones are cheap and refer to the same allocation; `same_batch` tells whether two
/// handles came from the same fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBatch(Arc<Vec<Quote>>);

impl QuoteBatch {
    /// Wrap freshly built quotes.
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self(Arc::new(quotes))
    }

    /// A synthetic batch covering the whole catalog.
    pub fn synthetic(catalog: &Catalog) -> Self {
        let mut rng = rand::rng();
        Self::new(catalog.iter().map(|spec| Quote::synthetic(spec, &mut rng)).collect())
    }

    /// Whether `self` and `other` are handles to the same batch instance.
    pub fn same_batch(&self, other: &QuoteBatch) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Quote for `symbol`, if present.
    pub fn get(&self, symbol: IndexSymbol) -> Option<&Quote> {
        self.0.iter().find(|q| q.symbol == symbol)
    }

    /// Symbols in batch order.
    pub fn symbols(&self) -> Vec<IndexSymbol> {
        self.0.iter().map(|q| q.symbol).collect()
    }

    /// Whether any entry was generated locally.
    pub fn is_synthetic(&self) -> bool {
        self.0.iter().any(|q| q.source == Provenance::Synthetic)
    }

    /// Whether every entry is an error placeholder (vacuously false when empty).
    pub fn all_failed(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|q| q.is_error)
    }
}

impl Deref for QuoteBatch {
    type Target = [Quote];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for QuoteBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl From<Vec<Quote>> for QuoteBatch {
    fn from(quotes: Vec<Quote>) -> Self {
        Self::new(quotes)
    }
}
