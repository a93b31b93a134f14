//! `guardian_scan_core`: a real-time transaction security scan pipeline.
//!
//! A scan request is parsed into a [`types::ParsedTransaction`], run
//! through four concurrent analyzers — the exploit [`patterns::PatternEngine`],
//! [`analyzers::ProgramAnalyzer`], [`analyzers::AccountAnalyzer`], and
//! [`analyzers::AnomalyAnalyzer`] — fused into a risk verdict by
//! [`scorer::score`], explained by an [`explainer::Explainer`], and returned
//! as a [`types::ScanResult`]. [`admission::AdmissionLayer`] sits in front of
//! the pipeline to bound concurrency and queue depth.

pub mod admission;
pub mod analyzers;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod explainer;
pub mod fingerprint;
pub mod metrics;
pub mod orchestrator;
pub mod parser;
pub mod patterns;
pub mod scorer;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use admission::AdmissionLayer;
use analyzers::{AccountAnalyzer, AnomalyAnalyzer, ProgramAnalyzer};
use cache::{CacheBackend, InMemoryCache};
use config::ScanConfig;
use error::Result;
use events::{NullEventSink, ScanEventSink};
use explainer::{Explainer, TemplateExplainer};
use guardian_ml::AnomalyModel;
use orchestrator::ScanPipeline;
use patterns::PatternEngine;
use types::{ExploitPattern, ScanRequest, ScanResult};

pub use metrics::MetricsCollector;

/// Top-level service wiring the orchestrator behind the admission layer.
/// This is the type a binary (CLI or gateway) constructs and calls
/// `submit` on; everything else in this crate is a collaborator it owns.
pub struct GuardianScanService<B: CacheBackend> {
    pipeline: Arc<ScanPipeline<B>>,
    admission: Arc<AdmissionLayer<ScanRequest, ScanResult>>,
    metrics: Arc<MetricsCollector>,
}

impl<B: CacheBackend + 'static> GuardianScanService<B> {
    pub fn new(
        config: ScanConfig,
        initial_patterns: Vec<ExploitPattern>,
        verified_programs: Vec<String>,
        blocklisted_programs: Vec<String>,
        anomaly_model: AnomalyModel,
        cache_backend: B,
        explainer: Arc<dyn Explainer>,
        event_sink: Arc<dyn ScanEventSink>,
    ) -> Self {
        let patterns = Arc::new(PatternEngine::new(initial_patterns, &config));
        let program_analyzer = ProgramAnalyzer::new(verified_programs, blocklisted_programs);
        let account_analyzer = AccountAnalyzer::new();
        let anomaly_analyzer = AnomalyAnalyzer::new(anomaly_model);

        let admission_cfg = config.admission.clone();
        let per_request_deadline = config.pipeline_deadline() + Duration::from_millis(200);

        let pipeline = Arc::new(ScanPipeline::new(
            config,
            patterns,
            program_analyzer,
            account_analyzer,
            anomaly_analyzer,
            cache_backend,
            explainer,
            event_sink,
        ));

        let admission = AdmissionLayer::new(&admission_cfg, per_request_deadline);
        let metrics = Arc::new(MetricsCollector::new());

        let handler_pipeline = Arc::clone(&pipeline);
        let handler: admission::ScanHandler<ScanRequest, ScanResult> = Arc::new(move |request| {
            let pipeline = Arc::clone(&handler_pipeline);
            Box::pin(async move { pipeline.scan(request).await })
        });
        admission.spawn_workers(admission_cfg.workers, handler);

        GuardianScanService {
            pipeline,
            admission,
            metrics,
        }
    }

    /// Submits a scan request through the admission layer, honoring its
    /// queue, concurrency cap, and circuit breaker.
    pub async fn submit(&self, request: ScanRequest) -> Result<ScanResult> {
        let priority = request.priority.unwrap_or_else(|| request.scan_type.default_priority());
        let result = self.admission.submit(request, priority).await;
        match &result {
            Ok(scan) => {
                self.metrics.record_admitted();
                self.metrics.record_completed(scan.degraded);
                for analyzer in &scan.timed_out_analyzers {
                    self.metrics.record_analyzer_timeout(analyzer);
                }
            }
            Err(error::ScanError::QueueFull) | Err(error::ScanError::AdmissionBreakerOpen { .. }) => {
                self.metrics.record_rejected();
            }
            Err(_) => {}
        }
        result
    }

    pub fn reload_patterns(&self, patterns: Vec<ExploitPattern>) {
        self.pipeline.patterns().reload_patterns(patterns);
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn admission_stats(&self) -> admission::AdmissionStats {
        self.admission.stats()
    }
}

/// Convenience constructor for a single-process demo deployment: an
/// in-memory cache backend, the deterministic template explainer, and a
/// null event sink. Production deployments swap these for real
/// `CacheBackend`/`Explainer`/`ScanEventSink` implementations.
pub fn demo_service(config: ScanConfig, patterns: Vec<ExploitPattern>) -> GuardianScanService<InMemoryCache> {
    let cache_backend = InMemoryCache::new(&config.cache);
    GuardianScanService::new(
        config,
        patterns,
        vec!["11111111111111111111111111111111".to_string()],
        vec![],
        AnomalyModel::new(),
        cache_backend,
        Arc::new(TemplateExplainer),
        Arc::new(NullEventSink),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn sample_blob() -> String {
        let json = r#"{
            "instructions": [
                {"program_id": "11111111111111111111111111111111", "accounts": ["acct1"], "data": [1,2,3]}
            ],
            "signatures_required": 1
        }"#;
        base64::engine::general_purpose::STANDARD.encode(json)
    }

    #[tokio::test]
    async fn demo_service_scans_a_simple_transfer_as_safe() {
        let service = demo_service(ScanConfig::default(), vec![]);
        let result = service
            .submit(ScanRequest {
                transaction_blob: sample_blob(),
                wallet_address: "wallet1".to_string(),
                scan_type: types::ScanType::Quick,
                priority: None,
            })
            .await
            .unwrap();
        assert_eq!(result.risk_level, types::RiskLevel::Safe);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn demo_service_flags_blocklisted_program() {
        let pattern = ExploitPattern {
            id: "bl1".to_string(),
            name: "known drainer".to_string(),
            kind: types::PatternKind::ProgramBlocklist,
            severity: types::Severity::Critical,
            base_confidence: 0.95,
            pattern: None,
            program_ids: vec!["drainer_program".to_string()],
            behavioral_rules: None,
            description: "known drainer".to_string(),
            match_count: 0,
            false_positive_count: 0,
        };
        let service = demo_service(ScanConfig::default(), vec![pattern]);

        let json = r#"{
            "instructions": [
                {"program_id": "drainer_program", "accounts": ["acct1"], "data": []}
            ],
            "signatures_required": 1
        }"#;
        let blob = base64::engine::general_purpose::STANDARD.encode(json);

        let result = service
            .submit(ScanRequest {
                transaction_blob: blob,
                wallet_address: "wallet1".to_string(),
                scan_type: types::ScanType::Quick,
                priority: None,
            })
            .await
            .unwrap();
        assert_eq!(result.risk_level, types::RiskLevel::Danger);
    }
}
