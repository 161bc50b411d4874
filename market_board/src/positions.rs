//! Memoised marker positions.
//!
//! Positions are keyed by the symbol set, the viewport and the marker radius. A refresh
//! that only changes quote values reuses the cached map, so markers do not jump around
//! on every tick.

use std::collections::BTreeSet;

use log::debug;
use market_common::{IndexSymbol, Quote};

use crate::layout::{self, LayoutParams, PositionMap, Viewport};

#[derive(Debug, Clone, PartialEq)]
struct LayoutKey {
    symbols: BTreeSet<IndexSymbol>,
    viewport: Viewport,
    radius: f64,
}

/// Position map reused across value-only refreshes.
#[derive(Debug, Default)]
pub struct PositionCache {
    params: LayoutParams,
    key: Option<LayoutKey>,
    positions: PositionMap,
    recomputations: usize,
}

impl PositionCache {
    /// Empty cache using the default layout constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache using `params`.
    pub fn with_params(params: LayoutParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Positions for `quotes`, recomputed only when the symbol set, the viewport or the
    /// radius differ from the cached layout.
    pub fn positions(&mut self, quotes: &[Quote], viewport: Viewport, radius: f64) -> &PositionMap {
        let key = LayoutKey {
            symbols: quotes.iter().map(|q| q.symbol).collect(),
            viewport,
            radius,
        };
        if self.key.as_ref() != Some(&key) {
            self.positions = layout::layout_with(quotes, viewport, radius, &self.params);
            self.recomputations += 1;
            debug!(
                "Laid out {} markers in {}x{} (recomputation #{})",
                self.positions.len(),
                viewport.width,
                viewport.height,
                self.recomputations
            );
            self.key = Some(key);
        }
        &self.positions
    }

    /// Force the next `positions` call to recompute.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.positions.clear();
    }

    /// How many times the layout has been computed.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }
}
