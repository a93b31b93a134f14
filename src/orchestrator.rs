//! Scan pipeline orchestrator: parses the transaction, fans it out to the
//! four analyzers concurrently (each under its own deadline), fuses their
//! output into a risk verdict, generates an explanation, and emits a
//! fire-and-forget scan event.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;

use crate::analyzers::{AccountAnalyzer, AnomalyAnalyzer, ProgramAnalyzer};
use crate::cache::{CacheBackend, GuardedCache};
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::events::ScanEventSink;
use crate::explainer::{fallback_explanation, Explainer};
use crate::fingerprint;
use crate::parser::TransactionParser;
use crate::patterns::PatternEngine;
use crate::scorer;
use crate::types::{
    now_epoch_ms, AnalyzerOutcomes, ParsedTransaction, ScanEvent, ScanRequest, ScanResult,
};

pub struct ScanPipeline<B: CacheBackend> {
    config: ScanConfig,
    parser: TransactionParser,
    patterns: Arc<PatternEngine>,
    program_analyzer: ProgramAnalyzer,
    account_analyzer: AccountAnalyzer,
    anomaly_analyzer: AnomalyAnalyzer,
    cache: GuardedCache<B>,
    explainer: Arc<dyn Explainer>,
    event_sink: Arc<dyn ScanEventSink>,
}

impl<B: CacheBackend + 'static> ScanPipeline<B> {
    pub fn new(
        config: ScanConfig,
        patterns: Arc<PatternEngine>,
        program_analyzer: ProgramAnalyzer,
        account_analyzer: AccountAnalyzer,
        anomaly_analyzer: AnomalyAnalyzer,
        cache_backend: B,
        explainer: Arc<dyn Explainer>,
        event_sink: Arc<dyn ScanEventSink>,
    ) -> Self {
        let cache = GuardedCache::new(cache_backend, &config.cache);
        ScanPipeline {
            parser: TransactionParser::new(config.max_transaction_bytes),
            config,
            patterns,
            program_analyzer,
            account_analyzer,
            anomaly_analyzer,
            cache,
            explainer,
            event_sink,
        }
    }

    pub async fn scan(&self, request: ScanRequest) -> Result<ScanResult> {
        let deadline = self.config.pipeline_deadline();
        match timeout(deadline, self.scan_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::ScanTimeout {
                deadline_ms: deadline.as_millis() as u64,
            }),
        }
    }

    async fn scan_inner(&self, request: ScanRequest) -> Result<ScanResult> {
        let start = Instant::now();

        let tx = self
            .parser
            .parse(&request.wallet_address, &request.transaction_blob)
            .map_err(|e| ScanError::Parse(e.to_string()))?;

        // Keyed by fingerprint *and* catalogue version, so a pattern
        // reload invalidates every cached verdict instead of serving a
        // stale one computed against the old catalogue.
        let cache_key = format!("{}:{}", tx.fingerprint, self.patterns.catalogue_version());

        if let Some(cached) = self.cached_result(&cache_key, start).await {
            self.emit_event(&tx, &cached, request.scan_type);
            return Ok(cached);
        }

        let outcomes = self.run_analyzers(&tx).await;

        let verdict = scorer::score(&outcomes);

        let explanation = self.explain(&verdict, &outcomes).await;

        let result = ScanResult {
            scan_id: ScanResult::new_scan_id(),
            fingerprint: tx.fingerprint.clone(),
            risk_level: verdict.risk_level,
            risk_score: verdict.risk_score,
            confidence: verdict.confidence,
            pattern_matches: outcomes.pattern_matches.clone().unwrap_or_default(),
            program_analysis: outcomes.program_analysis.clone(),
            account_analysis: outcomes.account_analysis.clone(),
            anomaly_analysis: outcomes.anomaly_analysis.clone(),
            explanation: explanation.explanation,
            recommendation: explanation.recommendation,
            degraded: verdict.degraded,
            timed_out_analyzers: outcomes.timed_out.clone(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        self.cache_result(&cache_key, &result).await;
        self.emit_event(&tx, &result, request.scan_type);

        Ok(result)
    }

    /// Looks up a previously computed verdict for this transaction
    /// fingerprint + catalogue version. A hit skips analyzer fan-out,
    /// scoring, and explanation entirely — only `scan_id` and `elapsed_ms`
    /// are re-stamped, since those describe this call, not the cached one.
    async fn cached_result(&self, cache_key: &str, start: Instant) -> Option<ScanResult> {
        let cached = self.cache.get("scan_result", cache_key).await?;
        let mut result: ScanResult = serde_json::from_slice(&cached).ok()?;
        result.scan_id = ScanResult::new_scan_id();
        result.elapsed_ms = start.elapsed().as_millis() as u64;
        Some(result)
    }

    async fn cache_result(&self, cache_key: &str, result: &ScanResult) {
        if let Ok(bytes) = serde_json::to_vec(result) {
            self.cache.set("scan_result", cache_key, bytes);
        }
    }

    async fn run_analyzers(&self, tx: &Arc<ParsedTransaction>) -> AnalyzerOutcomes {
        let deadline = self.config.analyzer_deadline();

        let (pattern_result, program_result, account_result, anomaly_result) = tokio::join!(
            timeout(deadline, self.patterns.match_transaction(tx, &self.cache)),
            timeout(deadline, async { self.program_analyzer.analyze(tx) }),
            timeout(deadline, async { self.account_analyzer.analyze(tx) }),
            timeout(deadline, async { self.anomaly_analyzer.analyze(tx) }),
        );

        let mut timed_out = Vec::new();

        let pattern_matches = match pattern_result {
            Ok(matches) => Some(matches),
            Err(_) => {
                timed_out.push("pattern_engine".to_string());
                None
            }
        };

        let program_analysis = match program_result {
            Ok(analysis) => Some(analysis),
            Err(_) => {
                timed_out.push("program_analyzer".to_string());
                None
            }
        };

        let account_analysis = match account_result {
            Ok(analysis) => Some(analysis),
            Err(_) => {
                timed_out.push("account_analyzer".to_string());
                None
            }
        };

        let anomaly_analysis = match anomaly_result {
            Ok(analysis) => Some(analysis),
            Err(_) => {
                timed_out.push("anomaly_analyzer".to_string());
                None
            }
        };

        AnalyzerOutcomes {
            pattern_matches,
            program_analysis,
            account_analysis,
            anomaly_analysis,
            timed_out,
        }
    }

    async fn explain(&self, verdict: &scorer::RiskVerdict, outcomes: &AnalyzerOutcomes) -> crate::explainer::Explanation {
        let matches = outcomes.pattern_matches.clone().unwrap_or_default();
        match timeout(
            self.config.explainer_deadline(),
            self.explainer.explain(verdict.risk_level, verdict.risk_score, &matches),
        )
        .await
        {
            Ok(explanation) => explanation,
            Err(_) => {
                tracing::warn!("explainer exceeded its deadline, using fallback template");
                fallback_explanation(verdict.risk_level, verdict.risk_score, &matches)
            }
        }
    }

    fn emit_event(&self, tx: &ParsedTransaction, result: &ScanResult, scan_type: crate::types::ScanType) {
        let event = ScanEvent {
            scan_id: result.scan_id.clone(),
            fingerprint: result.fingerprint.clone(),
            wallet_address: tx.wallet_address.clone(),
            risk_level: result.risk_level,
            risk_score: result.risk_score,
            confidence: result.confidence,
            scan_time_ms: result.elapsed_ms,
            program_count: tx.programs.len(),
            instruction_count: tx.instructions.len(),
            pattern_matches_count: result.pattern_matches.len(),
            scan_type,
            timestamp_epoch_ms: now_epoch_ms(),
        };
        let sink = Arc::clone(&self.event_sink);
        tokio::spawn(async move {
            sink.emit(event).await;
        });
    }

    pub fn patterns(&self) -> &Arc<PatternEngine> {
        &self.patterns
    }

    pub fn fingerprint_of(&self, tx: &ParsedTransaction) -> String {
        fingerprint::fingerprint(tx)
    }
}
