use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;

use crate::config::CacheConfig;

use super::CacheBackend;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

struct Namespace {
    ttl: Duration,
    entries: Mutex<LruCache<String, Entry>>,
}

/// Default in-process cache: one bounded LRU per namespace, each entry
/// tagged with an absolute expiry computed from that namespace's configured
/// TTL. Suitable for a single-process deployment or as the gateway's demo
/// backend; a distributed deployment would swap in a different
/// `CacheBackend` implementation (e.g. a Redis-backed one) without the rest
/// of the pipeline changing.
pub struct InMemoryCache {
    namespaces: DashMap<String, Namespace>,
    default_ttl: Duration,
    default_capacity: NonZeroUsize,
}

impl InMemoryCache {
    pub fn new(cfg: &CacheConfig) -> Self {
        let namespaces = DashMap::new();
        for (name, ns_cfg) in &cfg.namespaces {
            namespaces.insert(
                name.clone(),
                Namespace {
                    ttl: Duration::from_secs(ns_cfg.ttl_secs),
                    entries: Mutex::new(LruCache::new(
                        NonZeroUsize::new(ns_cfg.max_entries.max(1)).unwrap(),
                    )),
                },
            );
        }
        InMemoryCache {
            namespaces,
            default_ttl: Duration::from_secs(300),
            default_capacity: NonZeroUsize::new(10_000).unwrap(),
        }
    }

    fn namespace(&self, name: &str) -> dashmap::mapref::one::Ref<'_, String, Namespace> {
        if !self.namespaces.contains_key(name) {
            self.namespaces.entry(name.to_string()).or_insert_with(|| Namespace {
                ttl: self.default_ttl,
                entries: Mutex::new(LruCache::new(self.default_capacity)),
            });
        }
        self.namespaces.get(name).expect("namespace just inserted")
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        let ns = self.namespace(namespace);
        let mut entries = ns.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) {
        let ns = self.namespace(namespace);
        let expires_at = Instant::now() + ns.ttl;
        ns.entries.lock().put(key.to_string(), Entry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_retrieves_within_ttl() {
        let cfg = CacheConfig::default();
        let cache = InMemoryCache::new(&cfg);
        cache.set("scan_result", "abc", b"hello".to_vec()).await;
        assert_eq!(cache.get("scan_result", "abc").await, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn unknown_namespace_falls_back_to_default_config() {
        let cfg = CacheConfig::default();
        let cache = InMemoryCache::new(&cfg);
        cache.set("adhoc_namespace", "k", b"v".to_vec()).await;
        assert_eq!(cache.get("adhoc_namespace", "k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn missing_key_returns_none() {
        let cfg = CacheConfig::default();
        let cache = InMemoryCache::new(&cfg);
        assert_eq!(cache.get("scan_result", "missing").await, None);
    }
}
