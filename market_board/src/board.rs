//! Turns feed events into renderable board frames.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use market_common::{IndexSymbol, QuoteBatch};
use market_feed::{FeedEvent, FeedUpdate};
use serde::Serialize;

use crate::layout::{PositionMap, Viewport};
use crate::marker::MarkerSize;
use crate::positions::PositionCache;

/// Shown when a refresh produced nothing to draw.
pub const NO_DATA_MESSAGE: &str = "Unable to fetch market data. Please try again later.";

/// Everything a renderer needs to draw one state of the board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardFrame {
    /// Quotes in catalog order.
    pub quotes: QuoteBatch,
    /// Marker centre per symbol.
    pub positions: PositionMap,
    /// Symbols to highlight.
    pub changed: BTreeSet<IndexSymbol>,
    /// Marker size hint for the current viewport.
    pub marker: MarkerSize,
    /// Change highlights are active.
    pub transitioning: bool,
    /// At least one quote is synthetic.
    pub is_synthetic: bool,
    /// Consumer-facing error, if there is nothing useful to show.
    pub error: Option<String>,
    /// Time of the update this frame was built from.
    pub updated_at: DateTime<Utc>,
}

/// Board state between feed events.
pub struct Board {
    viewport: Viewport,
    marker: MarkerSize,
    positions: PositionCache,
    last: Option<FeedUpdate>,
}

impl Board {
    /// Board drawing into `viewport`.
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            marker: MarkerSize::for_width(viewport.width),
            positions: PositionCache::new(),
            last: None,
        }
    }

    /// Apply one feed event. Returns the frame to render, or `None` on shutdown or when
    /// there is nothing to redraw.
    pub fn apply(&mut self, event: FeedEvent) -> Option<BoardFrame> {
        match event {
            FeedEvent::Updated(update) => {
                self.last = Some(update);
                self.frame()
            }
            FeedEvent::TransitionEnded => {
                let last = self.last.as_mut()?;
                last.changed.clear();
                last.transitioning = false;
                self.frame()
            }
            FeedEvent::Shutdown => None,
        }
    }

    /// Change the viewport; positions are recomputed on the next frame.
    pub fn resize(&mut self, viewport: Viewport) -> Option<BoardFrame> {
        self.viewport = viewport;
        self.marker = MarkerSize::for_width(viewport.width);
        self.frame()
    }

    /// Frame for the last update, if any.
    pub fn frame(&mut self) -> Option<BoardFrame> {
        let update = self.last.as_ref()?;
        let batch = &update.batch;
        let positions = self
            .positions
            .positions(batch, self.viewport, self.marker.radius())
            .clone();

        Some(BoardFrame {
            quotes: batch.clone(),
            positions,
            changed: update.changed.iter().copied().collect(),
            marker: self.marker,
            transitioning: update.transitioning,
            is_synthetic: batch.is_synthetic(),
            error: batch.is_empty().then(|| NO_DATA_MESSAGE.to_string()),
            updated_at: update.updated_at,
        })
    }

    /// Layouts computed so far.
    pub fn layout_count(&self) -> usize {
        self.positions.recomputations()
    }
}
