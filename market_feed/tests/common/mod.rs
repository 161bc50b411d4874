//! In-memory providers shared by the integration tests.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_channel::Receiver;
use market_common::catalog::{Catalog, IndexSymbol, QuoteSpec};
use market_common::quote::{Provenance, QuoteValues};
use market_common::{MarketError, Quote, Result};
use market_feed::{QuoteProvider, SymbolProvider};

pub fn quote(spec: &QuoteSpec, change_percent: f64, source: Provenance) -> Quote {
    let values = QuoteValues {
        price: Some(1000.0),
        change_percent,
        volume: 1,
    };
    Quote::from_spec(spec, values, source)
}

/// Primary provider answering from a script of results, one per call.
///
/// When the script runs out the last entry repeats. An optional gate blocks every
/// call until a message (or disconnect) arrives.
pub struct ScriptedPrimary {
    calls: AtomicUsize,
    script: Mutex<Vec<std::result::Result<f64, String>>>,
    gate: Option<Receiver<()>>,
}

impl ScriptedPrimary {
    pub fn new(script: Vec<std::result::Result<f64, String>>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script),
            gate: None,
        }
    }

    pub fn gated(script: Vec<std::result::Result<f64, String>>, gate: Receiver<()>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(script)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QuoteProvider for ScriptedPrimary {
    fn fetch_batch(&self, catalog: &Catalog, _force_fresh: bool) -> Result<Vec<Quote>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        let step = {
            let script = self.script.lock().unwrap();
            script[call.min(script.len() - 1)].clone()
        };
        match step {
            Ok(change) => Ok(catalog
                .iter()
                .map(|spec| quote(spec, change, Provenance::Primary))
                .collect()),
            Err(message) if message == "panic" => panic!("provider blew up"),
            Err(message) => Err(MarketError::Transport(message)),
        }
    }

    fn fetch_quote(&self, spec: &QuoteSpec) -> Result<Quote> {
        Ok(quote(spec, 0.0, Provenance::Primary))
    }
}

/// Secondary provider failing for a fixed set of symbols.
pub struct FlakySecondary {
    pub failing: Vec<IndexSymbol>,
    calls: AtomicUsize,
}

impl FlakySecondary {
    pub fn new(failing: Vec<IndexSymbol>) -> Self {
        Self {
            failing,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SymbolProvider for FlakySecondary {
    fn fetch_symbol(&self, spec: &QuoteSpec) -> Result<Quote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&spec.symbol) {
            return Err(MarketError::PerSymbol {
                symbol: spec.symbol.to_string(),
                reason: "not found".into(),
            });
        }
        Ok(quote(spec, 0.75, Provenance::Secondary))
    }
}
