//! Index symbols, their static display metadata and geographic anchors.
//!
//! The catalog is fixed at process start. Every `QuoteSpec` carries the anchor the
//! layout engine projects to plane coordinates; several anchors are nudged away from
//! the exchange's real location so neighbouring markers start further apart.

use std::collections::HashSet;
use std::io::BufRead;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::MarketError;

/// Trait providing file parsing for catalog symbols.
pub trait SymbolParser {
    /// Parses symbols from a buffered reader.
    ///
    /// Symbols may be separated by commas, spaces or new lines. Both the provider form
    /// (`^GSPC`) and the short lowercase form (`gspc`) are accepted. Returns an error if
    /// any token cannot be parsed.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<IndexSymbol>, MarketError>;
}

impl SymbolParser for IndexSymbol {
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<Self>, MarketError> {
        let mut symbols = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(MarketError::Io)?;
            for token in line
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
            {
                match token.parse::<Self>() {
                    Ok(symbol) => symbols.push(symbol),
                    Err(e) => {
                        return Err(MarketError::ParseSymbolsFile(format!("{token}: {e}")));
                    }
                }
            }
        }
        Ok(symbols)
    }
}

/// Supported market index symbols.
///
/// `Display` yields the provider symbol (`^GSPC`, `000001.SS`, ...), which is also the
/// serde representation.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    EnumIter,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
)]
#[serde(try_from = "String", into = "String")]
#[clap(rename_all = "lower")]
#[strum(ascii_case_insensitive)]
pub enum IndexSymbol {
    #[strum(to_string = "^GSPC", serialize = "gspc")]
    Gspc,
    #[strum(to_string = "^DJI", serialize = "dji")]
    Dji,
    #[strum(to_string = "^IXIC", serialize = "ixic")]
    Ixic,
    #[strum(to_string = "^FCHI", serialize = "fchi")]
    Fchi,
    #[strum(to_string = "^GDAXI", serialize = "gdaxi")]
    Gdaxi,
    #[strum(to_string = "^N225", serialize = "n225")]
    N225,
    #[strum(to_string = "000001.SS", serialize = "sse")]
    Sse,
    #[strum(to_string = "399001.SZ", serialize = "szse")]
    Szse,
    #[strum(to_string = "^HSI", serialize = "hsi")]
    Hsi,
    #[strum(to_string = "^TWII", serialize = "twii")]
    Twii,
    #[strum(to_string = "^AXJO", serialize = "axjo")]
    Axjo,
    #[strum(to_string = "^STI", serialize = "sti")]
    Sti,
    #[strum(to_string = "^KLSE", serialize = "klse")]
    Klse,
    #[strum(to_string = "^FTSE", serialize = "ftse")]
    Ftse,
    #[strum(to_string = "^STOXX50E", serialize = "stoxx50e")]
    Stoxx50e,
    #[strum(to_string = "^BSESN", serialize = "bsesn")]
    Bsesn,
    #[strum(to_string = "^NSEI", serialize = "nsei")]
    Nsei,
    #[strum(to_string = "^MERV", serialize = "merv")]
    Merv,
    #[strum(to_string = "^BVSP", serialize = "bvsp")]
    Bvsp,
    #[strum(to_string = "^MXX", serialize = "mxx")]
    Mxx,
}

impl TryFrom<String> for IndexSymbol {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|_| MarketError::UnknownSymbol(value))
    }
}

impl From<IndexSymbol> for String {
    fn from(symbol: IndexSymbol) -> Self {
        symbol.to_string()
    }
}

impl IndexSymbol {
    /// Static metadata for this symbol.
    pub fn spec(self) -> QuoteSpec {
        use IndexSymbol::*;
        let (display_name, name, lat, lon) = match self {
            Gspc => ("S&P 500", "Standard & Poor's 500", 40.7128, -73.0060),
            Dji => ("Dow Jones", "Dow Jones Industrial Average", 39.5, -75.0060),
            Ixic => ("Nasdaq", "Nasdaq Composite", 41.5, -73.8),
            Fchi => ("CAC 40", "Euronext Paris CAC 40", 48.8566, 2.3522),
            Gdaxi => ("DAX", "Deutscher Aktienindex", 52.5200, 13.4050),
            N225 => ("Nikkei 225", "Nikkei Stock Average", 35.6762, 142.6503),
            Sse => ("SSE", "Shanghai Composite", 32.5, 119.5),
            Szse => ("SZSE", "Shenzhen Component", 22.5431, 116.5),
            Hsi => ("Hang Seng", "Hang Seng Index", 22.3193, 112.0),
            Twii => ("TAIEX", "Taiwan Capitalization Weighted", 25.0330, 123.9),
            Axjo => ("ASX 200", "S&P/ASX 200", -33.8688, 153.5),
            Sti => ("STI", "Straits Times Index", 1.3521, 106.8),
            Klse => ("KLCI", "FTSE Bursa Malaysia KLCI", 3.1390, 103.5),
            Ftse => ("FTSE 100", "Financial Times Stock Exchange 100", 51.5074, -0.1278),
            Stoxx50e => ("Euro Stoxx 50", "EURO STOXX 50", 50.8503, 4.3517),
            Bsesn => ("Sensex", "BSE Sensex", 19.0760, 72.8777),
            Nsei => ("Nifty 50", "NSE Nifty 50", 28.6139, 77.2090),
            Merv => ("Merval", "S&P Merval", -34.6037, -58.3816),
            Bvsp => ("Bovespa", "Ibovespa", -23.5505, -46.6333),
            Mxx => ("IPC", "S&P/BMV IPC", 19.4326, -99.1332),
        };
        QuoteSpec {
            symbol: self,
            display_name,
            name,
            anchor: GeoPoint { lat, lon },
        }
    }
}

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude, positive north.
    pub lat: f64,
    /// Longitude, positive east.
    pub lon: f64,
}

/// Static, immutable description of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteSpec {
    /// Unique key.
    pub symbol: IndexSymbol,
    /// Short label shown inside the marker.
    pub display_name: &'static str,
    /// Human-readable full name shown under the marker.
    pub name: &'static str,
    /// Geographic anchor the marker is placed around.
    pub anchor: GeoPoint,
}

/// Ordered set of `QuoteSpec`s the feed fetches in one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    specs: Vec<QuoteSpec>,
}

impl Catalog {
    /// The full catalog of every known index.
    pub fn standard() -> Self {
        Self::from_symbols(IndexSymbol::iter())
    }

    /// A catalog restricted to `symbols`, keeping first-seen order and dropping duplicates.
    pub fn from_symbols<I: IntoIterator<Item = IndexSymbol>>(symbols: I) -> Self {
        let mut seen = HashSet::new();
        let specs = symbols
            .into_iter()
            .filter(|s| seen.insert(*s))
            .map(IndexSymbol::spec)
            .collect();
        Self { specs }
    }

    /// Look up the spec of `symbol` if it is part of this catalog.
    pub fn get(&self, symbol: IndexSymbol) -> Option<&QuoteSpec> {
        self.specs.iter().find(|s| s.symbol == symbol)
    }

    /// Resolve a provider symbol string against this catalog.
    pub fn resolve(&self, raw: &str) -> Option<&QuoteSpec> {
        raw.parse::<IndexSymbol>().ok().and_then(|s| self.get(s))
    }

    /// Iterate over the specs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &QuoteSpec> {
        self.specs.iter()
    }

    /// Symbols in catalog order.
    pub fn symbols(&self) -> Vec<IndexSymbol> {
        self.specs.iter().map(|s| s.symbol).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
