//! Background refresh loop and update broadcasting.
//!
//! `MarketFeed::start` spawns one worker thread that owns every timer of the sync
//! layer and publishes `FeedEvent`s to the consumer:
//!
//! - `FeedEvent::Updated(FeedUpdate)` — a new batch plus the symbols that changed
//!   materially since the previous one.
//! - `FeedEvent::TransitionEnded` — the change highlight hold expired.
//! - `FeedEvent::Shutdown` — the worker is gone; no further events follow.
//!
//! The worker refreshes once at start, then on every interval tick (skipped while the
//! cache is younger than half the interval) and on manual triggers. Triggers that
//! arrive while a refresh is running are folded into one. Shutdown disconnects the
//! worker's cancellation channel, which wakes the `select!` immediately; interval,
//! hold and backoff timers are dropped with it.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, after, never, select, tick, unbounded};
use log::{debug, error, info};
use market_common::config::SyncConfig;
use market_common::{IndexSymbol, MarketError, QuoteBatch, Result};

use crate::cache::{CacheManager, CacheStatus};
use crate::detector;
use crate::shutdown::{ShutdownHandle, ShutdownSignal};

/// One published refresh.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    /// Batch returned by the cache.
    pub batch: QuoteBatch,
    /// Symbols whose percent change or direction moved since the previous batch.
    pub changed: HashSet<IndexSymbol>,
    /// Whether change highlights are active (`changed` is non-empty).
    pub transitioning: bool,
    /// When the update was published.
    pub updated_at: DateTime<Utc>,
}

/// Message sent by the feed worker to its consumer.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// New batch.
    Updated(FeedUpdate),
    /// Change highlights expired.
    TransitionEnded,
    /// The worker stopped.
    Shutdown,
}

/// Whether an interval tick should refresh, given the cache state.
///
/// A tick refreshes when nothing is cached or the data is older than half of
/// `interval`.
pub fn refresh_due(status: &CacheStatus, interval: Duration) -> bool {
    if !status.has_cached_data {
        return true;
    }
    match status.data_age {
        Some(age) => age > interval / 2,
        None => true,
    }
}

/// Handle to the running feed worker.
pub struct MarketFeed {
    cache: Arc<CacheManager>,
    refresh_tx: Sender<()>,
    shutdown: ShutdownHandle,
    worker: Option<JoinHandle<()>>,
}

impl MarketFeed {
    /// Start the worker and return the handle plus the event stream.
    pub fn start(cache: Arc<CacheManager>, config: &SyncConfig) -> (Self, Receiver<FeedEvent>) {
        let (events_tx, events_rx) = unbounded();
        let (refresh_tx, refresh_rx) = unbounded();
        let shutdown = ShutdownHandle::new();

        let worker = FeedWorker {
            cache: Arc::clone(&cache),
            events: events_tx,
            shutdown: shutdown.signal(),
            interval: config.refresh_interval,
            transition_hold: config.transition_hold,
            previous: None,
            transition_reset: never(),
        };
        let handle = thread::spawn(move || worker.run(refresh_rx));
        info!(
            "Market feed started (refresh every {:?})",
            config.refresh_interval
        );

        (
            Self {
                cache,
                refresh_tx,
                shutdown,
                worker: Some(handle),
            },
            events_rx,
        )
    }

    /// Ask for a forced refresh.
    pub fn refresh(&self) -> Result<()> {
        self.refresh_tx
            .send(())
            .map_err(|e| MarketError::ChannelSend(e.to_string()))
    }

    /// The cache backing this feed.
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Stop the worker and all timers, shut the cache down and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.trigger();
        self.cache.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Market feed worker panicked");
            }
            info!("Market feed stopped");
        }
    }
}

impl Drop for MarketFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// What woke the worker up.
enum Wake {
    Stop,
    Refresh,
    Tick,
    TransitionEnded,
}

struct FeedWorker {
    cache: Arc<CacheManager>,
    events: Sender<FeedEvent>,
    shutdown: ShutdownSignal,
    interval: Duration,
    transition_hold: Duration,
    previous: Option<QuoteBatch>,
    transition_reset: Receiver<Instant>,
}

impl FeedWorker {
    fn run(mut self, refresh_rx: Receiver<()>) {
        let ticker = tick(self.interval);
        let shutdown_rx = self.shutdown.receiver().clone();

        let mut running = self.refresh();
        while running {
            let transition_reset = self.transition_reset.clone();
            let wake = select! {
                recv(shutdown_rx) -> _ => Wake::Stop,
                recv(refresh_rx) -> msg => if msg.is_ok() { Wake::Refresh } else { Wake::Stop },
                recv(ticker) -> _ => Wake::Tick,
                recv(transition_reset) -> _ => Wake::TransitionEnded,
            };

            running = match wake {
                Wake::Stop => false,
                Wake::Refresh => {
                    while refresh_rx.try_recv().is_ok() {}
                    self.refresh()
                }
                Wake::Tick if refresh_due(&self.cache.status(), self.interval) => self.refresh(),
                Wake::Tick => {
                    debug!("Cache still fresh, skipping scheduled refresh");
                    true
                }
                Wake::TransitionEnded => {
                    self.transition_reset = never();
                    self.publish(FeedEvent::TransitionEnded)
                }
            };
        }

        let _ = self.events.send(FeedEvent::Shutdown);
        debug!("Feed worker exiting");
    }

    /// Fetch, diff and publish. Returns `false` when the worker should stop.
    fn refresh(&mut self) -> bool {
        let batch = self.cache.get_quotes(true);
        if self.shutdown.is_shut_down() {
            return false;
        }

        let changed = match &self.previous {
            Some(previous) => detector::diff(previous, &batch),
            None => HashSet::new(),
        };
        let transitioning = !changed.is_empty();
        if transitioning {
            debug!("{} symbols changed", changed.len());
            self.transition_reset = after(self.transition_hold);
        }
        self.previous = Some(batch.clone());

        self.publish(FeedEvent::Updated(FeedUpdate {
            batch,
            changed,
            transitioning,
            updated_at: Utc::now(),
        }))
    }

    fn publish(&self, event: FeedEvent) -> bool {
        if self.events.send(event).is_err() {
            info!("Feed consumer disconnected");
            return false;
        }
        true
    }
}
