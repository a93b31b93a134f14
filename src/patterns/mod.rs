//! Exploit pattern catalogue and matching engine.
//!
//! The catalogue is held behind an `arc_swap::ArcSwap` so a reload can
//! publish a brand-new snapshot without ever blocking an in-flight match —
//! readers always see either the old or the new catalogue, never a partial
//! one. Matching fans the transaction out to up to four independent
//! sub-matchers (one per pattern kind), each under its own deadline, then
//! dedupes, sorts by severity, and caps the result at a fixed maximum.

mod catalogue;
mod matchers;

pub use catalogue::PatternCatalogue;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::cache::{CacheBackend, GuardedCache};
use crate::config::ScanConfig;
use crate::types::{ExploitPattern, ParsedTransaction, PatternMatch, Severity};

const STATE_READY: u8 = 0;
const STATE_RELOADING: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Ready,
    Reloading,
}

/// Per-sub-matcher deadline: short, because pattern matching runs as one of
/// four analyzer tasks inside the pipeline's own analyzer deadline.
const SUBMATCHER_DEADLINE: Duration = Duration::from_millis(400);

/// Runtime effectiveness counters, kept outside the immutable catalogue
/// snapshot so a reload never races a counter write. Incremented through a
/// best-effort channel: a full channel (or a dropped receiver) just means a
/// match goes uncounted, never a blocked scan.
pub struct PatternEngine {
    catalogue: ArcSwap<PatternCatalogue>,
    state: AtomicU8,
    max_matches: usize,
    match_counters: Arc<DashMap<String, u64>>,
    counter_tx: mpsc::UnboundedSender<String>,
}

impl PatternEngine {
    pub fn new(initial: Vec<ExploitPattern>, cfg: &ScanConfig) -> Self {
        let match_counters: Arc<DashMap<String, u64>> = Arc::new(DashMap::new());
        let (counter_tx, mut counter_rx) = mpsc::unbounded_channel::<String>();
        let counters_bg = Arc::clone(&match_counters);
        tokio::spawn(async move {
            while let Some(pattern_id) = counter_rx.recv().await {
                *counters_bg.entry(pattern_id).or_insert(0) += 1;
            }
        });

        PatternEngine {
            catalogue: ArcSwap::from_pointee(PatternCatalogue::from_patterns(1, initial)),
            state: AtomicU8::new(STATE_READY),
            max_matches: cfg.max_matches_returned,
            match_counters,
            counter_tx,
        }
    }

    /// Opportunistic per-pattern match count observed since this engine
    /// started (or since its last reload cleared the side table). Zero for
    /// a pattern id that has never matched or that the counter channel
    /// hasn't drained yet.
    pub fn match_count(&self, pattern_id: &str) -> u64 {
        self.match_counters.get(pattern_id).map(|v| *v).unwrap_or(0)
    }

    pub fn state(&self) -> EngineState {
        match self.state.load(Ordering::Acquire) {
            STATE_RELOADING => EngineState::Reloading,
            _ => EngineState::Ready,
        }
    }

    /// Atomically publishes a new catalogue snapshot. In-flight matches
    /// keep using whichever snapshot they already loaded.
    pub fn reload_patterns(&self, patterns: Vec<ExploitPattern>) {
        self.state.store(STATE_RELOADING, Ordering::Release);
        let next_version = self.catalogue.load().version + 1;
        self.catalogue
            .store(Arc::new(PatternCatalogue::from_patterns(next_version, patterns)));
        self.state.store(STATE_READY, Ordering::Release);
    }

    pub fn catalogue_version(&self) -> u64 {
        self.catalogue.load().version
    }

    /// Matches a transaction against the current catalogue snapshot.
    ///
    /// Looks up the pattern-match cache by fingerprint first; on a miss,
    /// runs the four sub-matchers concurrently, each bounded by its own
    /// deadline, then dedupes by pattern id, sorts most-severe-first, and
    /// caps the result to the configured maximum. A critical-severity hit
    /// short-circuits the remaining matchers, since nothing they find can
    /// raise the verdict further and the scan pipeline is latency-bound.
    pub async fn match_transaction<B: CacheBackend + 'static>(
        &self,
        tx: &ParsedTransaction,
        cache: &GuardedCache<B>,
    ) -> Vec<PatternMatch> {
        if let Some(cached) = cache.get("pattern_match", &tx.fingerprint).await {
            if let Ok(matches) = serde_json::from_slice::<Vec<PatternMatch>>(&cached) {
                return matches;
            }
        }

        let catalogue = self.catalogue.load_full();

        let blocklist_matches = matchers::match_program_blocklist(tx, &catalogue);
        if blocklist_matches.iter().any(|m| m.severity == Severity::Critical) {
            self.record_matches(&blocklist_matches);
            self.cache_and_return(cache, tx, blocklist_matches.clone()).await;
            return blocklist_matches;
        }

        let (regex_matches, heuristic_matches, behavioral_matches) = tokio::join!(
            run_bounded(|| matchers::match_instruction_regex(tx, &catalogue)),
            run_bounded(|| matchers::match_account_heuristic(tx, &catalogue)),
            run_bounded(|| matchers::match_behavioral_rule(tx, &catalogue)),
        );

        let mut all_matches = blocklist_matches;
        all_matches.extend(regex_matches.unwrap_or_default());
        all_matches.extend(heuristic_matches.unwrap_or_default());
        all_matches.extend(behavioral_matches.unwrap_or_default());

        dedupe_and_adjust(&mut all_matches);
        all_matches.sort_by(|a, b| b.severity.cmp(&a.severity).then(b.confidence.partial_cmp(&a.confidence).unwrap()));
        all_matches.truncate(self.max_matches);

        self.record_matches(&all_matches);
        self.cache_and_return(cache, tx, all_matches.clone()).await;
        all_matches
    }

    /// Opportunistically increments `match_count` for every pattern that
    /// fired, through the best-effort channel; never awaited, never on the
    /// critical path.
    fn record_matches(&self, matches: &[PatternMatch]) {
        for m in matches {
            let _ = self.counter_tx.send(m.pattern_id.clone());
        }
    }

    async fn cache_and_return<B: CacheBackend + 'static>(
        &self,
        cache: &GuardedCache<B>,
        tx: &ParsedTransaction,
        matches: Vec<PatternMatch>,
    ) {
        if let Ok(bytes) = serde_json::to_vec(&matches) {
            cache.set("pattern_match", &tx.fingerprint, bytes);
        }
    }

}

async fn run_bounded<F>(f: F) -> Option<Vec<PatternMatch>>
where
    F: FnOnce() -> Vec<PatternMatch>,
{
    match timeout(SUBMATCHER_DEADLINE, async { f() }).await {
        Ok(matches) => Some(matches),
        Err(_) => {
            tracing::warn!("pattern sub-matcher exceeded its deadline");
            None
        }
    }
}

/// Collapses duplicate pattern ids (the same rule can fire via more than
/// one sub-matcher if a catalogue author double-enters it) and boosts
/// confidence slightly for every corroborating match of the same pattern,
/// capped at 0.99 so corroboration never implies certainty.
fn dedupe_and_adjust(matches: &mut Vec<PatternMatch>) {
    use std::collections::HashMap;
    let mut by_id: HashMap<String, PatternMatch> = HashMap::new();
    let mut counts: HashMap<String, u32> = HashMap::new();

    for m in matches.drain(..) {
        *counts.entry(m.pattern_id.clone()).or_insert(0) += 1;
        by_id
            .entry(m.pattern_id.clone())
            .and_modify(|existing| {
                if m.confidence > existing.confidence {
                    *existing = m.clone();
                }
            })
            .or_insert(m);
    }

    for (id, entry) in by_id.iter_mut() {
        let corroborations = counts.get(id).copied().unwrap_or(1);
        if corroborations > 1 {
            entry.confidence = (entry.confidence * (1.0 + 0.05 * (corroborations as f64 - 1.0))).min(0.99);
        }
    }

    matches.extend(by_id.into_values());
}
