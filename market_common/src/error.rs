//! Error types shared across the market workspace.
//!
//! The `MarketError` enum unifies provider failures, payload validation problems,
//! I/O, serialization and channel failures, allowing every crate to propagate a
//! single error type with `?`.
use std::io;

use thiserror::Error;

/// Unified error type for the feed, the cache and the board.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Timeout, connection failure or HTTP 5xx. Retried automatically by the remote client.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered, but the payload is empty or has the wrong shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The provider refused the request (HTTP 4xx). Not retried.
    #[error("Request rejected with HTTP status {status}: {url}")]
    Rejected {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Request URL with credentials stripped.
        url: String,
    },

    /// Failure of a single symbol inside a per-symbol fan-out.
    #[error("Symbol {symbol} unavailable: {reason}")]
    PerSymbol {
        /// Symbol that could not be fetched.
        symbol: String,
        /// Underlying failure description.
        reason: String,
    },

    /// A provider or file referenced a symbol that is not part of the catalog.
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Error while parsing a symbols file into catalog symbols.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The component was shut down and refuses new work.
    #[error("Shut down: {0}")]
    ShutDown(String),

    /// I/O error originating from the standard library or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Crossbeam/channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),
}

impl MarketError {
    /// Whether the remote client should retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::Transport(_))
    }
}
