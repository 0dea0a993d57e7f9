//! Query Result Cache
//!
//! Process-wide TTL cache for expensive aggregate reads. This is the one
//! piece of shared mutable state in the system, and it is deliberately
//! dumb: a mutex-guarded map with insertion-order (approximate FIFO)
//! eviction. Invalidation is the correctness mechanism - every mutation
//! that changes a cached aggregate must `clear` the affected keys; a
//! missed invalidation is a staleness bug bounded by the TTL, never
//! corruption.
//!
//! Not to be confused with the per-request loader memo in `loader`: that
//! one is request-scoped and relation-keyed, this one is process-wide and
//! query-shape-keyed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default capacity bound.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    value: JsonValue,
    inserted_at: Instant,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order for FIFO eviction. May briefly hold keys already
    /// removed from `entries`; eviction skips those.
    order: VecDeque<String>,
    stats: CacheStats,
}

/// TTL + capacity bounded cache of JSON aggregates, keyed by free-form
/// query-shape strings. Share via `Arc`; all methods take `&self`.
pub struct QueryCache {
    config: QueryCacheConfig,
    inner: Mutex<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryCacheConfig::default())
    }
}

impl QueryCache {
    pub fn new(config: QueryCacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Look up a key. A read past the TTL is a miss and drops the stale
    /// entry.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        let mut guard = self.inner.lock().expect("query cache poisoned");
        let inner = &mut *guard;
        match inner.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.config.ttl => {
                inner.stats.hits += 1;
                tracing::debug!(key, "query cache hit");
                Some(inner.entries[key].value.clone())
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.stats.misses += 1;
                tracing::debug!(key, "query cache expired");
                None
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Typed read via serde.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// Insert or replace a key. Replacement refreshes the insertion
    /// timestamp and the FIFO position.
    pub fn set(&self, key: &str, value: JsonValue) {
        let mut inner = self.inner.lock().expect("query cache poisoned");
        if inner.entries.contains_key(key) {
            inner.order.retain(|k| k != key);
        }
        inner.order.push_back(key.to_string());
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        while inner.entries.len() > self.config.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.remove(&oldest).is_some() {
                inner.stats.evictions += 1;
                tracing::debug!(key = %oldest, "query cache evicted oldest entry");
            }
        }
    }

    /// Typed insert via serde. Values that fail to serialize are skipped;
    /// the cache only ever makes reads cheaper, never correctness-bearing.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(json) = serde_json::to_value(value) {
            self.set(key, json);
        }
    }

    /// Invalidate entries. `None` wipes everything; `Some(pattern)`
    /// removes every key containing the pattern as a substring.
    pub fn clear(&self, pattern: Option<&str>) {
        let mut inner = self.inner.lock().expect("query cache poisoned");
        match pattern {
            None => {
                inner.entries.clear();
                inner.order.clear();
                tracing::debug!("query cache cleared");
            }
            Some(pattern) => {
                inner.entries.retain(|k, _| !k.contains(pattern));
                let retained: std::collections::HashSet<String> =
                    inner.entries.keys().cloned().collect();
                inner.order.retain(|k| retained.contains(k));
                tracing::debug!(pattern, "query cache cleared by pattern");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("query cache poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().expect("query cache poisoned").stats
    }
}
