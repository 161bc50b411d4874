//! Single shared cache entry for the whole catalog.
//!
//! `CacheManager::get_quotes` never fails. It serves, in order of preference:
//!
//! - the cached batch, while it is younger than the freshness window;
//! - the result of the refresh already in flight (single-flight: concurrent callers
//!   register a one-shot channel and receive the leader's batch);
//! - a fresh batch from the primary provider;
//! - the last good batch, when the primary fails;
//! - a merged per-symbol batch from the secondary provider, when nothing is cached;
//! - a synthetic batch, generated once and reused as backup.
//!
//! Failures are recorded and exposed through `status()`. The in-flight flag is reset
//! by a drop guard, so a panicking provider cannot wedge the cache.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use market_common::catalog::{Catalog, IndexSymbol};
use market_common::config::SyncConfig;
use market_common::quote::Provenance;
use market_common::{MarketError, Quote, QuoteBatch, Result};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::primary::PrimaryClient;
use crate::provider::{QuoteProvider, SymbolProvider};
use crate::secondary::SecondaryClient;
use crate::shutdown::ShutdownHandle;

/// Introspection snapshot of the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    /// A batch (primary or secondary) is cached.
    pub has_cached_data: bool,
    /// UTC time of the last successful primary fetch.
    pub last_fetch_time: Option<DateTime<Utc>>,
    /// A refresh is in flight.
    pub is_refreshing: bool,
    /// Callers currently waiting on the in-flight refresh.
    pub waiting_callers: usize,
    /// The most recent refresh recorded an error.
    pub has_error: bool,
    /// Message of that error.
    pub error_message: Option<String>,
    /// Time since the last successful primary fetch.
    pub data_age: Option<Duration>,
    /// `shutdown` has been called.
    pub is_shut_down: bool,
}

#[derive(Default)]
struct CacheEntry {
    batch: Option<QuoteBatch>,
    fetched_at: Option<Instant>,
    fetched_at_utc: Option<DateTime<Utc>>,
    backup: Option<QuoteBatch>,
    last_error: Option<String>,
    in_flight: bool,
    waiters: Vec<Sender<QuoteBatch>>,
}

impl CacheEntry {
    fn fresh_batch(&self, now: Instant, window: Duration) -> Option<QuoteBatch> {
        let fetched_at = self.fetched_at?;
        if now.saturating_duration_since(fetched_at) < window {
            self.batch.clone()
        } else {
            None
        }
    }

    fn backup_or_synthetic(&mut self, catalog: &Catalog) -> QuoteBatch {
        if let Some(backup) = &self.backup {
            return backup.clone();
        }
        let batch = QuoteBatch::synthetic(catalog);
        warn!("Serving {} synthetic quotes", batch.len());
        self.backup = Some(batch.clone());
        batch
    }

    fn best_effort(&mut self, catalog: &Catalog) -> QuoteBatch {
        match &self.batch {
            Some(batch) => batch.clone(),
            None => self.backup_or_synthetic(catalog),
        }
    }
}

/// Owner of the catalog-wide cache entry and its provider fallback chain.
pub struct CacheManager {
    catalog: Catalog,
    freshness_window: Duration,
    primary: Arc<dyn QuoteProvider>,
    secondary: Option<Arc<dyn SymbolProvider>>,
    clock: Arc<dyn Clock>,
    entry: Mutex<CacheEntry>,
    shutdown: ShutdownHandle,
}

impl CacheManager {
    /// Create a manager talking HTTP to the providers named in `config`.
    pub fn new(catalog: Catalog, config: &SyncConfig) -> Result<Self> {
        let shutdown = ShutdownHandle::new();
        let primary: Arc<dyn QuoteProvider> =
            Arc::new(PrimaryClient::new(config, shutdown.signal())?);
        let secondary = match &config.secondary {
            Some(endpoint) => Some(Arc::new(SecondaryClient::new(
                endpoint.clone(),
                config,
                shutdown.signal(),
            )?) as Arc<dyn SymbolProvider>),
            None => None,
        };
        info!(
            "Cache manager created for {} symbols (secondary provider {})",
            catalog.len(),
            if secondary.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self::from_parts(catalog, config, primary, secondary, shutdown))
    }

    /// Create a manager with injected providers.
    pub fn with_providers(
        catalog: Catalog,
        config: &SyncConfig,
        primary: Arc<dyn QuoteProvider>,
        secondary: Option<Arc<dyn SymbolProvider>>,
    ) -> Self {
        Self::from_parts(catalog, config, primary, secondary, ShutdownHandle::new())
    }

    /// Replace the time source used for freshness checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_parts(
        catalog: Catalog,
        config: &SyncConfig,
        primary: Arc<dyn QuoteProvider>,
        secondary: Option<Arc<dyn SymbolProvider>>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            catalog,
            freshness_window: config.freshness_window,
            primary,
            secondary,
            clock: Arc::new(SystemClock),
            entry: Mutex::new(CacheEntry::default()),
            shutdown,
        }
    }

    /// The catalog this cache serves.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Best-effort batch for the whole catalog. Never fails.
    pub fn get_quotes(&self, force_refresh: bool) -> QuoteBatch {
        let waiter = {
            let mut entry = self.lock_entry();
            if !force_refresh {
                if let Some(batch) = entry.fresh_batch(self.clock.now(), self.freshness_window) {
                    debug!("Cache hit ({} quotes)", batch.len());
                    return batch;
                }
            }
            if self.shutdown.is_triggered() {
                return entry.best_effort(&self.catalog);
            }
            if entry.in_flight {
                let (tx, rx) = crossbeam_channel::bounded(1);
                entry.waiters.push(tx);
                debug!("Joining in-flight refresh ({} waiting)", entry.waiters.len());
                Some(rx)
            } else {
                entry.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return match rx.recv() {
                Ok(batch) => batch,
                // leader went away without a result
                Err(_) => self.lock_entry().best_effort(&self.catalog),
            };
        }

        let mut flight = InFlight {
            manager: self,
            result: None,
        };
        let batch = self.refresh(force_refresh);
        flight.result = Some(batch.clone());
        batch
    }

    /// Quote for one symbol: from the batch if present, otherwise fetched individually.
    pub fn get_quote(&self, symbol: IndexSymbol) -> Result<Quote> {
        let spec = *self
            .catalog
            .get(symbol)
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))?;
        let batch = self.get_quotes(false);
        if let Some(quote) = batch.get(symbol).filter(|q| !q.is_error) {
            return Ok(quote.clone());
        }
        if self.shutdown.is_triggered() {
            return Err(MarketError::ShutDown("cache manager".into()));
        }
        debug!("{} missing from batch, fetching individually", symbol);
        self.primary.fetch_quote(&spec)
    }

    /// Snapshot for observability.
    pub fn status(&self) -> CacheStatus {
        let now = self.clock.now();
        let entry = self.lock_entry();
        CacheStatus {
            has_cached_data: entry.batch.is_some(),
            last_fetch_time: entry.fetched_at_utc,
            is_refreshing: entry.in_flight,
            waiting_callers: entry.waiters.len(),
            has_error: entry.last_error.is_some(),
            error_message: entry.last_error.clone(),
            data_age: entry.fetched_at.map(|t| now.saturating_duration_since(t)),
            is_shut_down: self.shutdown.is_triggered(),
        }
    }

    /// Drop cached, backup and error state. An in-flight refresh is not affected.
    pub fn clear(&self) {
        let mut entry = self.lock_entry();
        entry.batch = None;
        entry.fetched_at = None;
        entry.fetched_at_utc = None;
        entry.backup = None;
        entry.last_error = None;
        info!("Market data cache cleared");
    }

    /// Seed the synthetic backup batch so a cold start without providers is instant.
    pub fn preload_synthetic(&self) {
        let mut entry = self.lock_entry();
        if entry.backup.is_none() {
            entry.backup = Some(QuoteBatch::synthetic(&self.catalog));
            debug!("Synthetic backup batch preloaded");
        }
    }

    /// Cancel backoff sleeps and stop writing results into the cache.
    ///
    /// Later calls are answered from what is already cached, without network.
    pub fn shutdown(&self) {
        if !self.shutdown.is_triggered() {
            self.shutdown.trigger();
            info!("Cache manager shut down");
        }
    }

    /// Whether `shutdown` was called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_triggered()
    }

    fn lock_entry(&self) -> MutexGuard<'_, CacheEntry> {
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refresh(&self, force_fresh: bool) -> QuoteBatch {
        match self.primary.fetch_batch(&self.catalog, force_fresh) {
            Ok(quotes) => {
                let batch = QuoteBatch::new(quotes);
                let mut entry = self.lock_entry();
                if !self.shutdown.is_triggered() {
                    entry.batch = Some(batch.clone());
                    entry.fetched_at = Some(self.clock.now());
                    entry.fetched_at_utc = Some(Utc::now());
                    entry.last_error = None;
                }
                info!("Fetched {} index quotes", batch.len());
                batch
            }
            Err(e) => {
                error!("Primary fetch failed: {}", e);
                {
                    let mut entry = self.lock_entry();
                    if !self.shutdown.is_triggered() {
                        entry.last_error = Some(e.to_string());
                    }
                    if let Some(batch) = &entry.batch {
                        info!("Serving cached batch after primary failure");
                        return batch.clone();
                    }
                }
                if let Some(batch) = self.fetch_secondary() {
                    let mut entry = self.lock_entry();
                    if !self.shutdown.is_triggered() {
                        entry.batch = Some(batch.clone());
                    }
                    return batch;
                }
                self.lock_entry().backup_or_synthetic(&self.catalog)
            }
        }
    }

    /// Fan out one request per symbol and wait for all of them.
    fn fetch_secondary(&self) -> Option<QuoteBatch> {
        let secondary = self.secondary.as_ref()?;
        if self.shutdown.is_triggered() {
            return None;
        }
        info!(
            "Falling back to the secondary provider for {} symbols",
            self.catalog.len()
        );

        let quotes: Vec<Quote> = thread::scope(|scope| {
            let pending: Vec<_> = self
                .catalog
                .iter()
                .map(|spec| (spec, scope.spawn(move || secondary.fetch_symbol(spec))))
                .collect();
            pending
                .into_iter()
                .map(|(spec, handle)| match handle.join() {
                    Ok(Ok(quote)) => quote,
                    Ok(Err(e)) => {
                        warn!("{}", e);
                        Quote::unavailable(spec, Provenance::Secondary)
                    }
                    Err(_) => {
                        error!("Secondary fetch for {} panicked", spec.symbol);
                        Quote::unavailable(spec, Provenance::Secondary)
                    }
                })
                .collect()
        });

        let batch = QuoteBatch::new(quotes);
        if batch.is_empty() || batch.all_failed() {
            warn!("Secondary provider failed for every symbol");
            return None;
        }
        let failed = batch.iter().filter(|q| q.is_error).count();
        info!(
            "Secondary provider delivered {} of {} symbols",
            batch.len() - failed,
            batch.len()
        );
        Some(batch)
    }
}

/// Clears the in-flight flag and hands the result to waiting callers on drop.
struct InFlight<'a> {
    manager: &'a CacheManager,
    result: Option<QuoteBatch>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut entry = self.manager.lock_entry();
            entry.in_flight = false;
            mem::take(&mut entry.waiters)
        };
        if let Some(batch) = &self.result {
            for waiter in waiters {
                let _ = waiter.send(batch.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use market_common::quote::QuoteValues;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPrimary {
        calls: AtomicUsize,
        fail: bool,
    }

    impl QuoteProvider for CountingPrimary {
        fn fetch_batch(&self, catalog: &Catalog, _force_fresh: bool) -> Result<Vec<Quote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MarketError::Transport("down".into()));
            }
            Ok(catalog
                .iter()
                .map(|spec| {
                    let values = QuoteValues {
                        price: Some(100.0),
                        change_percent: 1.0,
                        volume: 5,
                    };
                    Quote::from_spec(spec, values, Provenance::Primary)
                })
                .collect())
        }

        fn fetch_quote(&self, _spec: &market_common::QuoteSpec) -> Result<Quote> {
            Err(MarketError::Transport("down".into()))
        }
    }

    fn manager(fail: bool) -> (CacheManager, Arc<CountingPrimary>, Arc<ManualClock>) {
        let primary = Arc::new(CountingPrimary {
            calls: AtomicUsize::new(0),
            fail,
        });
        let clock = Arc::new(ManualClock::new());
        let manager = CacheManager::with_providers(
            Catalog::from_symbols([IndexSymbol::Gspc, IndexSymbol::Ftse]),
            &SyncConfig::new("test"),
            primary.clone(),
            None,
        )
        .with_clock(clock.clone());
        (manager, primary, clock)
    }

    #[test]
    fn status_reflects_successful_fetch() {
        let (manager, _, clock) = manager(false);
        assert!(!manager.status().has_cached_data);
        manager.get_quotes(false);
        clock.advance(Duration::from_secs(3));
        let status = manager.status();
        assert!(status.has_cached_data);
        assert!(!status.has_error);
        assert!(!status.is_refreshing);
        assert_eq!(status.data_age, Some(Duration::from_secs(3)));
        assert!(status.last_fetch_time.is_some());
    }

    #[test]
    fn failure_is_recorded_and_synthetic_backup_reused() {
        let (manager, primary, _) = manager(true);
        let first = manager.get_quotes(true);
        let second = manager.get_quotes(true);
        assert!(first.is_synthetic());
        assert!(first.same_batch(&second));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
        let status = manager.status();
        assert!(status.has_error);
        assert!(status.error_message.unwrap().contains("down"));
        assert!(!status.has_cached_data);
    }

    #[test]
    fn clear_forgets_everything() {
        let (manager, primary, _) = manager(false);
        manager.get_quotes(false);
        manager.clear();
        assert!(!manager.status().has_cached_data);
        manager.get_quotes(false);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn preloaded_backup_is_served_when_primary_fails() {
        let (manager, _, _) = manager(true);
        manager.preload_synthetic();
        let a = manager.get_quotes(false);
        let b = manager.get_quotes(false);
        assert!(a.same_batch(&b));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn shutdown_stops_network_calls() {
        let (manager, primary, _) = manager(false);
        let before = manager.get_quotes(false);
        manager.shutdown();
        let after = manager.get_quotes(true);
        assert!(before.same_batch(&after));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert!(manager.status().is_shut_down);
        assert!(matches!(
            manager.get_quote(IndexSymbol::Dji),
            Err(MarketError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn poisoned_entry_lock_is_recovered() {
        let (manager, primary, _) = manager(false);
        let manager = Arc::new(manager);
        let holder = Arc::clone(&manager);
        let _ = thread::spawn(move || {
            let _entry = holder.entry.lock().unwrap();
            panic!("panicked while holding the cache entry");
        })
        .join();
        assert!(manager.entry.is_poisoned());

        assert_eq!(manager.get_quotes(false).len(), 2);
        assert!(manager.status().has_cached_data);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_quote_reads_from_batch() {
        let (manager, primary, _) = manager(false);
        let quote = manager.get_quote(IndexSymbol::Ftse).unwrap();
        assert_eq!(quote.symbol, IndexSymbol::Ftse);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }
}
