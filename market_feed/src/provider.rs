//! Provider seams used by the cache manager.
//!
//! The HTTP clients in `primary` and `secondary` implement these; tests substitute
//! in-memory fakes.

use market_common::catalog::{Catalog, QuoteSpec};
use market_common::{Quote, Result};

/// Source that can deliver the whole catalog in one call.
pub trait QuoteProvider: Send + Sync {
    /// Fetch quotes for every catalog symbol the provider knows.
    ///
    /// Errors are `Transport` (already retried), `Rejected` or `MalformedResponse`.
    fn fetch_batch(&self, catalog: &Catalog, force_fresh: bool) -> Result<Vec<Quote>>;

    /// Fetch a single symbol outside of the batched call.
    fn fetch_quote(&self, spec: &QuoteSpec) -> Result<Quote>;
}

/// Source that answers one symbol per request.
pub trait SymbolProvider: Send + Sync {
    /// Fetch `spec`'s quote. Failures are reported as `MarketError::PerSymbol`.
    fn fetch_symbol(&self, spec: &QuoteSpec) -> Result<Quote>;
}
