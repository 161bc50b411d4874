//!
//! Common types shared by the market feed and the board.
//!
//! This crate aggregates:
//! - `error` — unified error type `MarketError` used across the workspace.
//! - `result` — handy `Result<T, MarketError>` alias.
//! - `catalog` — index symbols, display metadata and geographic anchors.
//! - `quote` — the `Quote` model and the shared `QuoteBatch`.
//! - `config` — provider endpoints and cache/retry timings.
#![warn(missing_docs)]
pub mod catalog;
pub mod config;
pub mod error;
pub mod quote;
pub mod result;

pub use catalog::{Catalog, IndexSymbol, QuoteSpec};
pub use config::SyncConfig;
pub use error::MarketError;
pub use quote::{Quote, QuoteBatch};
pub use result::Result;
