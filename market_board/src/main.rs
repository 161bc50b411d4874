//! Market Board — keeps a world-map board of major stock indices up to date and prints
//! every board frame (quotes, marker positions, highlights) to stdout as one JSON line.
//!
//! It fetches quotes through the shared cache (primary provider, optional per-symbol
//! secondary, synthetic fallback), refreshes them in the background and lays the
//! markers out for the requested viewport.
//!
//! Usage example (CLI):
//! ```bash
//! MARKET_API_KEY=... market_board --width 1280 --height 720 --path ./symbols.txt
//! ```
//!
//! The symbols file should contain index symbols (`^GSPC` or `gspc`) separated by
//! commas, spaces, or new lines. Without it the full catalog is shown.
#![warn(missing_docs)]
mod args;

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use crossbeam_channel::{bounded, select};
use log::{error, info, warn};
use market_board::{Board, BoardFrame, Viewport};
use market_common::catalog::SymbolParser;
use market_common::{Catalog, IndexSymbol, MarketError, Result};
use market_feed::{CacheManager, FeedEvent, MarketFeed};

use crate::args::Args;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let (stop_tx, stop_rx) = bounded(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down board...");
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| MarketError::Config(format!("Error setting Ctrl+C handler: {e}")))?;

    let catalog = load_catalog(args.path.as_deref())?;
    info!("Board covers {} indices", catalog.len());

    let config = args.sync_config();
    let cache = Arc::new(CacheManager::new(catalog, &config)?);
    if args.preload_synthetic {
        cache.preload_synthetic();
    }

    let (feed, events) = MarketFeed::start(Arc::clone(&cache), &config);
    let mut board = Board::new(Viewport::new(f64::from(args.width), f64::from(args.height)));

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(events) -> msg => match msg {
                Ok(FeedEvent::Shutdown) | Err(_) => {
                    warn!("Market feed stopped unexpectedly");
                    break;
                }
                Ok(event) => {
                    if let Some(frame) = board.apply(event) {
                        print_frame(&frame)?;
                        if args.once {
                            break;
                        }
                    }
                }
            }
        }
    }

    let status = cache.status();
    info!(
        "Final cache state: cached={} error={:?}",
        status.has_cached_data, status.error_message
    );
    feed.shutdown();
    Ok(())
}

fn print_frame(frame: &BoardFrame) -> Result<()> {
    if let Some(message) = &frame.error {
        error!("{}", message);
    }
    let line = serde_json::to_string(frame)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

/// Catalog restricted to the symbols file, or the full catalog without one.
fn load_catalog(raw_path: Option<&str>) -> Result<Catalog> {
    let Some(raw_path) = raw_path else {
        return Ok(Catalog::standard());
    };
    let file_path = normalize_path(raw_path);
    if !is_file_exist(&file_path) {
        return Err(MarketError::Config(format!(
            "symbols file not found: {}",
            file_path.display()
        )));
    }

    let file = File::open(&file_path)?;
    let symbols = IndexSymbol::parse_from_reader(BufReader::new(file))?;
    info!("Symbols: {:?}", symbols);
    if symbols.is_empty() {
        warn!("Symbols file is empty, showing the full catalog");
        return Ok(Catalog::standard());
    }
    Ok(Catalog::from_symbols(symbols))
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

/// Returns `true` if the provided path exists and is a regular file.
fn is_file_exist(path: &PathBuf) -> bool {
    path.exists() && path.is_file()
}
