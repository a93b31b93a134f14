//! Namespaced caching layer with a per-namespace circuit breaker.
//!
//! Grounded on `network::peer_manager::PeerManager`'s use of `DashMap` for
//! concurrent hot-path storage plus an `LruCache` behind a `parking_lot`
//! lock for bounded recency eviction; the breaker state machine follows the
//! same half-open-on-next-probe shape used by this workspace's connection
//! management code.

mod memory;

pub use crate::breaker::{BreakerState, CircuitBreaker};
pub use memory::InMemoryCache;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::config::CacheConfig;

/// A namespaced key/value cache collaborator. Implementations are expected
/// to apply their own per-namespace TTL; callers never pass a TTL in.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>);
}

/// Caps a cache key so pathological inputs (e.g. a full transaction blob
/// used as a key) never blow up backing-store key limits: keys longer than
/// 100 characters are replaced with their blake3 hex digest.
pub fn normalize_key(key: &str) -> String {
    if key.len() <= 100 {
        key.to_string()
    } else {
        blake3::hash(key.as_bytes()).to_hex().to_string()
    }
}

/// Wraps any `CacheBackend` with a per-call timeout and a circuit breaker
/// so a slow or failing backend degrades to cache-miss-always instead of
/// blocking the scan pipeline. `get` is awaited (the pipeline needs the
/// answer) but bounded by `call_timeout`; `set` is genuinely fire-and-forget
/// — it is spawned onto its own task so a slow backend write never holds up
/// the caller, matching the "set never blocks" cache contract.
pub struct GuardedCache<B: CacheBackend> {
    inner: Arc<B>,
    breaker: Arc<CircuitBreaker>,
    call_timeout: std::time::Duration,
}

impl<B: CacheBackend + 'static> GuardedCache<B> {
    pub fn new(inner: B, cfg: &CacheConfig) -> Self {
        GuardedCache {
            inner: Arc::new(inner),
            breaker: Arc::new(CircuitBreaker::new(cfg.breaker_failure_threshold, cfg.breaker_reset_secs)),
            call_timeout: cfg.call_timeout(),
        }
    }

    /// A timeout counts as a backend failure against the breaker; a
    /// completed call (hit or miss) counts as a success regardless of
    /// whether the key was present, since an empty namespace is not a
    /// backend problem.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        if !self.breaker.allow() {
            return None;
        }
        let key = normalize_key(key);
        match timeout(self.call_timeout, self.inner.get(namespace, &key)).await {
            Ok(result) => {
                self.breaker.record_success();
                result
            }
            Err(_) => {
                tracing::warn!(namespace, "cache get exceeded its deadline");
                self.breaker.record_failure();
                None
            }
        }
    }

    pub fn set(&self, namespace: &str, key: &str, value: Vec<u8>) {
        if !self.breaker.allow() {
            return;
        }
        let namespace = namespace.to_string();
        let key = normalize_key(key);
        let inner = Arc::clone(&self.inner);
        let breaker = Arc::clone(&self.breaker);
        let call_timeout = self.call_timeout;
        tokio::spawn(async move {
            match timeout(call_timeout, inner.set(&namespace, &key, value)).await {
                Ok(()) => breaker.record_success(),
                Err(_) => {
                    tracing::warn!(namespace = %namespace, "cache set exceeded its deadline");
                    breaker.record_failure();
                }
            }
        });
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_keys_pass_through_unchanged() {
        assert_eq!(normalize_key("abc"), "abc");
    }

    #[test]
    fn long_keys_are_hashed() {
        let long_key = "x".repeat(500);
        let normalized = normalize_key(&long_key);
        assert_eq!(normalized.len(), 64);
        assert_ne!(normalized, long_key);
    }

    #[tokio::test]
    async fn guarded_cache_roundtrips_through_memory_backend() {
        let cfg = CacheConfig::default();
        let cache = GuardedCache::new(InMemoryCache::new(&cfg), &cfg);
        cache.set("scan_result", "k1", b"v1".to_vec());
        // `set` is fire-and-forget; yield so the spawned task lands before
        // asserting the read-your-write behavior.
        tokio::task::yield_now().await;
        let got = cache.get("scan_result", "k1").await;
        assert_eq!(got, Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn get_timeout_trips_the_breaker() {
        struct SlowBackend;
        #[async_trait]
        impl CacheBackend for SlowBackend {
            async fn get(&self, _namespace: &str, _key: &str) -> Option<Vec<u8>> {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                None
            }
            async fn set(&self, _namespace: &str, _key: &str, _value: Vec<u8>) {}
        }

        let mut cfg = CacheConfig::default();
        cfg.call_timeout_ms = 5;
        cfg.breaker_failure_threshold = 1;
        let cache = GuardedCache::new(SlowBackend, &cfg);

        assert_eq!(cache.get("scan_result", "k").await, None);
        assert_eq!(cache.breaker_state(), BreakerState::Open);
    }
}
