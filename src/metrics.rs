//! Scan pipeline metrics collector.
//!
//! Mirrors `metrics::MetricsCollector`'s shape (a `parking_lot::RwLock`
//! around a plain snapshot struct, cloned out on read) but tracks scan
//! pipeline counters instead of node/peer counters. Prometheus export is
//! optional and only compiled in behind the `prometheus` feature, matching
//! how this workspace already gates that dependency.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::RwLock;

#[cfg(feature = "prometheus")]
mod prom {
    use lazy_static::lazy_static;
    use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

    lazy_static! {
        pub static ref REGISTRY: Registry = Registry::new();
        pub static ref SCANS_ADMITTED: IntCounter = IntCounter::new(
            "guardian_scans_admitted_total",
            "Total scans admitted past the admission layer"
        )
        .unwrap();
        pub static ref SCANS_REJECTED: IntCounter = IntCounter::new(
            "guardian_scans_rejected_total",
            "Total scans rejected by the admission layer"
        )
        .unwrap();
        pub static ref CACHE_HITS: IntCounterVec = IntCounterVec::new(
            Opts::new("guardian_cache_hits_total", "Cache hits by namespace"),
            &["namespace"]
        )
        .unwrap();
        pub static ref CACHE_MISSES: IntCounterVec = IntCounterVec::new(
            Opts::new("guardian_cache_misses_total", "Cache misses by namespace"),
            &["namespace"]
        )
        .unwrap();
    }

    pub fn register_all() {
        let _ = REGISTRY.register(Box::new(SCANS_ADMITTED.clone()));
        let _ = REGISTRY.register(Box::new(SCANS_REJECTED.clone()));
        let _ = REGISTRY.register(Box::new(CACHE_HITS.clone()));
        let _ = REGISTRY.register(Box::new(CACHE_MISSES.clone()));
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScanMetricsSnapshot {
    pub uptime_secs: u64,
    pub scans_admitted: u64,
    pub scans_rejected: u64,
    pub scans_completed: u64,
    pub scans_degraded: u64,
    pub admission_breaker_trips: u64,
    pub cache_breaker_trips: u64,
    pub analyzer_timeouts: HashMap<String, u64>,
    pub cache_hits: HashMap<String, u64>,
    pub cache_misses: HashMap<String, u64>,
}

pub struct MetricsCollector {
    state: RwLock<ScanMetricsSnapshot>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        #[cfg(feature = "prometheus")]
        prom::register_all();

        MetricsCollector {
            state: RwLock::new(ScanMetricsSnapshot::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_admitted(&self) {
        self.state.write().scans_admitted += 1;
        #[cfg(feature = "prometheus")]
        prom::SCANS_ADMITTED.inc();
    }

    pub fn record_rejected(&self) {
        self.state.write().scans_rejected += 1;
        #[cfg(feature = "prometheus")]
        prom::SCANS_REJECTED.inc();
    }

    pub fn record_completed(&self, degraded: bool) {
        let mut state = self.state.write();
        state.scans_completed += 1;
        if degraded {
            state.scans_degraded += 1;
        }
    }

    pub fn record_admission_breaker_trip(&self) {
        self.state.write().admission_breaker_trips += 1;
    }

    pub fn record_cache_breaker_trip(&self) {
        self.state.write().cache_breaker_trips += 1;
    }

    pub fn record_analyzer_timeout(&self, analyzer: &str) {
        *self
            .state
            .write()
            .analyzer_timeouts
            .entry(analyzer.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self, namespace: &str) {
        *self.state.write().cache_hits.entry(namespace.to_string()).or_insert(0) += 1;
        #[cfg(feature = "prometheus")]
        prom::CACHE_HITS.with_label_values(&[namespace]).inc();
    }

    pub fn record_cache_miss(&self, namespace: &str) {
        *self.state.write().cache_misses.entry(namespace.to_string()).or_insert(0) += 1;
        #[cfg(feature = "prometheus")]
        prom::CACHE_MISSES.with_label_values(&[namespace]).inc();
    }

    pub fn snapshot(&self) -> ScanMetricsSnapshot {
        let mut snapshot = self.state.read().clone();
        snapshot.uptime_secs = self.start_time.elapsed().as_secs();
        snapshot
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
