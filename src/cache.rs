use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Best-effort cache port. Backends must never fail the request path: a read
/// problem is a miss, a write problem is dropped.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Duration);
    async fn remove(&self, key: &str);
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheBackend, key: &str) -> Option<T> {
    let raw = cache.get(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Discarding undeserializable cache entry {key}: {e}");
            cache.remove(key).await;
            None
        }
    }
}

pub async fn set_json<T: Serialize>(cache: &dyn CacheBackend, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl).await,
        Err(e) => tracing::warn!("Failed to serialize cache entry {key}: {e}"),
    }
}

/// Typed wrapper for cached search results. Keys are normalized so the same
/// query hits regardless of casing and padding; empty result lists are never
/// stored, a flaky scrape should not shadow a later good one.
#[derive(Debug)]
pub struct SearchCache {
    backend: &'static (dyn CacheBackend + 'static),
}

impl SearchCache {
    pub fn new(backend: &'static dyn CacheBackend) -> Self {
        Self { backend }
    }

    pub fn key(adapter: &str, query: &str, category: Option<u32>) -> String {
        let category = category.map(|c| c.to_string()).unwrap_or_default();
        format!(
            "search:{adapter}:{category}:{}",
            query.trim().to_lowercase()
        )
    }

    pub async fn get(
        &self,
        adapter: &str,
        query: &str,
        category: Option<u32>,
    ) -> Option<Vec<crate::adapters::RawSearchResult>> {
        get_json(self.backend, &Self::key(adapter, query, category)).await
    }

    pub async fn set(
        &self,
        adapter: &str,
        query: &str,
        category: Option<u32>,
        results: &[crate::adapters::RawSearchResult],
        ttl: Duration,
    ) {
        if results.is_empty() || ttl.is_zero() {
            return;
        }
        set_json(
            self.backend,
            &Self::key(adapter, query, category),
            &results,
            ttl,
        )
        .await;
    }
}

#[derive(Debug)]
struct Entry {
    payload: String,
    expires_at: Instant,
}

/// In-process LRU backend. Capacity bounds memory, TTL bounds staleness.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or(NonZeroUsize::new(Self::DEFAULT_CAPACITY).expect("capacity is non zero"));
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = Entry {
            payload: value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().unwrap().put(key.to_string(), entry);
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().unwrap().pop(key);
    }
}
