//! Material-change detection between consecutive batches.

use std::collections::{HashMap, HashSet};

use market_common::{IndexSymbol, Quote};

/// Symbols of `current` whose percent change or direction differs from `previous`.
///
/// A symbol missing from `previous` counts as changed. Price and volume drift alone do
/// not. When either side is empty the result is empty, so the first load does not
/// light up the whole board.
pub fn diff(previous: &[Quote], current: &[Quote]) -> HashSet<IndexSymbol> {
    if previous.is_empty() || current.is_empty() {
        return HashSet::new();
    }
    let before: HashMap<IndexSymbol, &Quote> = previous.iter().map(|q| (q.symbol, q)).collect();

    current
        .iter()
        .filter(|now| match before.get(&now.symbol) {
            Some(then) => {
                then.change_percent != now.change_percent || then.is_positive != now.is_positive
            }
            None => true,
        })
        .map(|q| q.symbol)
        .collect()
}
