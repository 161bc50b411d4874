//! Market data synchronization: provider clients, the shared quote cache and the
//! background feed.
//!
//! Data flows from the provider clients (`primary`, `secondary`, both on top of
//! `http`) into the `CacheManager`, which is the only place fetch failures are
//! recovered. `MarketFeed` drives the cache on a timer, runs the change `detector`
//! against the previous batch and publishes `FeedEvent`s.
//!
//! - `cache` — single-flight, stale-while-revalidate cache with the fallback chain.
//! - `clock` — injectable monotonic time for freshness checks.
//! - `detector` — material-change diff between batches.
//! - `feed` — background refresh worker and its event stream.
//! - `http` — JSON GET with timeout and exponential backoff.
//! - `primary` / `secondary` — provider payload parsing and URLs.
//! - `provider` — the traits the cache talks to.
//! - `shutdown` — cancellation shared by timers and backoff sleeps.
#![warn(missing_docs)]
pub mod cache;
pub mod clock;
pub mod detector;
pub mod feed;
pub mod http;
pub mod primary;
pub mod provider;
pub mod secondary;
pub mod shutdown;

pub use cache::{CacheManager, CacheStatus};
pub use feed::{FeedEvent, FeedUpdate, MarketFeed};
pub use provider::{QuoteProvider, SymbolProvider};
