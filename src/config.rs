//! Runtime configuration for the scan pipeline.
//!
//! Mirrors the knobs named in the scan pipeline specification: pipeline and
//! per-analyzer deadlines, cache namespace TTLs, the admission queue/worker
//! pool/circuit breaker, and the pattern catalogue reload interval. Loaded
//! from TOML at startup with `ScanConfig::default()` covering every value
//! when no config file is present.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_pipeline_deadline_ms() -> u64 {
    1700
}

fn default_analyzer_deadline_ms() -> u64 {
    1200
}

fn default_explainer_deadline_ms() -> u64 {
    1000
}

fn default_max_transaction_bytes() -> usize {
    65536
}

fn default_pattern_cache_capacity() -> usize {
    4096
}

fn default_max_matches_returned() -> usize {
    20
}

fn default_pattern_reload_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheNamespaceConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheNamespaceConfig {
    fn default() -> Self {
        CacheNamespaceConfig {
            ttl_secs: 300,
            max_entries: 10_000,
        }
    }
}

fn default_cache_namespaces() -> HashMap<String, CacheNamespaceConfig> {
    let mut m = HashMap::new();
    m.insert(
        "program_reputation".to_string(),
        CacheNamespaceConfig {
            ttl_secs: 3600,
            max_entries: 20_000,
        },
    );
    m.insert(
        "pattern_match".to_string(),
        CacheNamespaceConfig {
            ttl_secs: 120,
            max_entries: 10_000,
        },
    );
    m.insert(
        "scan_result".to_string(),
        CacheNamespaceConfig {
            ttl_secs: 30,
            max_entries: 5_000,
        },
    );
    m.insert(
        "account_risk".to_string(),
        CacheNamespaceConfig {
            ttl_secs: 600,
            max_entries: 20_000,
        },
    );
    m
}

fn default_cache_breaker_failure_threshold() -> u32 {
    5
}

fn default_cache_breaker_reset_secs() -> u64 {
    60
}

fn default_cache_call_timeout_ms() -> u64 {
    50
}

fn default_admission_max_queue() -> usize {
    1000
}

fn default_admission_workers() -> usize {
    20
}

fn default_admission_max_concurrency() -> usize {
    100
}

fn default_admission_breaker_failure_threshold() -> u32 {
    10
}

fn default_admission_breaker_reset_secs() -> u64 {
    60
}

fn default_admission_max_retry_attempts() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub max_queue: usize,
    pub workers: usize,
    pub max_concurrency: usize,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_secs: u64,
    pub max_retry_attempts: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        AdmissionConfig {
            max_queue: default_admission_max_queue(),
            workers: default_admission_workers(),
            max_concurrency: default_admission_max_concurrency(),
            breaker_failure_threshold: default_admission_breaker_failure_threshold(),
            breaker_reset_secs: default_admission_breaker_reset_secs(),
            max_retry_attempts: default_admission_max_retry_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub namespaces: HashMap<String, CacheNamespaceConfig>,
    pub breaker_failure_threshold: u32,
    pub breaker_reset_secs: u64,
    #[serde(default = "default_cache_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            namespaces: default_cache_namespaces(),
            breaker_failure_threshold: default_cache_breaker_failure_threshold(),
            breaker_reset_secs: default_cache_breaker_reset_secs(),
            call_timeout_ms: default_cache_call_timeout_ms(),
        }
    }
}

impl CacheConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    #[serde(default = "default_pipeline_deadline_ms")]
    pub pipeline_deadline_ms: u64,
    #[serde(default = "default_analyzer_deadline_ms")]
    pub analyzer_deadline_ms: u64,
    #[serde(default = "default_explainer_deadline_ms")]
    pub explainer_deadline_ms: u64,
    #[serde(default = "default_max_transaction_bytes")]
    pub max_transaction_bytes: usize,
    #[serde(default = "default_pattern_cache_capacity")]
    pub pattern_cache_capacity: usize,
    #[serde(default = "default_max_matches_returned")]
    pub max_matches_returned: usize,
    #[serde(default = "default_pattern_reload_interval_secs")]
    pub pattern_reload_interval_secs: u64,
    pub cache: CacheConfig,
    pub admission: AdmissionConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            pipeline_deadline_ms: default_pipeline_deadline_ms(),
            analyzer_deadline_ms: default_analyzer_deadline_ms(),
            explainer_deadline_ms: default_explainer_deadline_ms(),
            max_transaction_bytes: default_max_transaction_bytes(),
            pattern_cache_capacity: default_pattern_cache_capacity(),
            max_matches_returned: default_max_matches_returned(),
            pattern_reload_interval_secs: default_pattern_reload_interval_secs(),
            cache: CacheConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_millis(self.pipeline_deadline_ms)
    }

    pub fn analyzer_deadline(&self) -> Duration {
        Duration::from_millis(self.analyzer_deadline_ms)
    }

    pub fn explainer_deadline(&self) -> Duration {
        Duration::from_millis(self.explainer_deadline_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_values() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.pipeline_deadline_ms, 1700);
        assert_eq!(cfg.admission.max_queue, 1000);
        assert_eq!(cfg.admission.workers, 20);
        assert_eq!(cfg.admission.max_concurrency, 100);
        assert_eq!(cfg.cache.breaker_failure_threshold, 5);
        assert_eq!(cfg.admission.breaker_failure_threshold, 10);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let raw = r#"
            pipeline_deadline_ms = 2000
        "#;
        let cfg = ScanConfig::from_toml_str(raw).unwrap();
        assert_eq!(cfg.pipeline_deadline_ms, 2000);
        assert_eq!(cfg.admission.max_queue, 1000);
    }
}
