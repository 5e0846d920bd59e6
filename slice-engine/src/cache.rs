//! Version-scoped, byte-budgeted LRU cache.
//!
//! Keys are `(repo, entity, version)`. One map with access-order promotion;
//! writers hold a short critical section for size accounting and eviction,
//! statistics are atomics and never affect correctness. A single oversized
//! entry is retained alone rather than thrashing.

use lru::LruCache;
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub repo_id: String,
    pub entity_id: String,
    pub version_id: String,
}

impl CacheKey {
    pub fn new(repo_id: &str, entity_id: &str, version_id: &str) -> Self {
        Self {
            repo_id: repo_id.to_string(),
            entity_id: entity_id.to_string(),
            version_id: version_id.to_string(),
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.repo_id, self.entity_id, self.version_id)
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    bytes: usize,
}

struct Inner<V> {
    map: LruCache<CacheKey, Entry<V>>,
    total_bytes: usize,
}

pub struct VersionCache<V> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    max_size_bytes: usize,
    stats: CacheStats,
}

impl<V: Clone> VersionCache<V> {
    pub fn new(max_entries: usize, max_size_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: LruCache::unbounded(),
                total_bytes: 0,
            }),
            max_entries: max_entries.max(1),
            max_size_bytes: max_size_bytes.max(1),
            stats: CacheStats::default(),
        }
    }

    /// Lookup with promotion to most-recently-used.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.map.get(key) {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace, then evict least-recently-used entries until both
    /// the entry and the byte budget are satisfied.
    pub fn put(&self, key: CacheKey, value: V, bytes: usize) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.map.put(key, Entry { value, bytes }) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.bytes);
        }
        inner.total_bytes += bytes;

        while inner.map.len() > 1
            && (inner.map.len() > self.max_entries || inner.total_bytes > self.max_size_bytes)
        {
            if let Some((evicted_key, evicted)) = inner.map.pop_lru() {
                inner.total_bytes = inner.total_bytes.saturating_sub(evicted.bytes);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %evicted_key, "cache: evicted");
            } else {
                break;
            }
        }
    }

    /// Drop every entry computed under `version_id`.
    pub fn invalidate_version(&self, version_id: &str) {
        let mut inner = self.inner.lock();
        let stale: Vec<CacheKey> = inner
            .map
            .iter()
            .filter(|(k, _)| k.version_id == version_id)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            if let Some(entry) = inner.map.pop(&key) {
                inner.total_bytes = inner.total_bytes.saturating_sub(entry.bytes);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(entity: &str, version: &str) -> CacheKey {
        CacheKey::new("r1", entity, version)
    }

    #[test]
    fn promotion_protects_recently_used_entries() {
        let cache: VersionCache<String> = VersionCache::new(2, 1 << 20);
        cache.put(key("a", "v1"), "A".into(), 10);
        cache.put(key("b", "v1"), "B".into(), 10);

        // Touch `a`, making `b` the eviction candidate.
        assert_eq!(cache.get(&key("a", "v1")).as_deref(), Some("A"));
        cache.put(key("c", "v1"), "C".into(), 10);

        assert!(cache.get(&key("a", "v1")).is_some());
        assert!(cache.get(&key("b", "v1")).is_none());
        assert!(cache.get(&key("c", "v1")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn byte_budget_evicts_until_satisfied() {
        let cache: VersionCache<String> = VersionCache::new(100, 100);
        cache.put(key("a", "v1"), "A".into(), 60);
        cache.put(key("b", "v1"), "B".into(), 60);
        assert_eq!(cache.len(), 1);
        assert!(cache.total_bytes() <= 100);
        assert!(cache.get(&key("b", "v1")).is_some());
    }

    #[test]
    fn single_oversized_entry_is_retained_alone() {
        let cache: VersionCache<String> = VersionCache::new(10, 50);
        cache.put(key("big", "v1"), "B".into(), 500);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("big", "v1")).is_some());
    }

    #[test]
    fn version_invalidation_is_suffix_scoped() {
        let cache: VersionCache<String> = VersionCache::new(10, 1 << 20);
        cache.put(key("a", "v1"), "A1".into(), 10);
        cache.put(key("b", "v1"), "B1".into(), 10);
        cache.put(key("a", "v2"), "A2".into(), 10);

        cache.invalidate_version("v1");

        assert!(cache.get(&key("a", "v1")).is_none());
        assert!(cache.get(&key("b", "v1")).is_none());
        assert_eq!(cache.get(&key("a", "v2")).as_deref(), Some("A2"));

        // The invalidated lookups register as misses.
        let stats = cache.stats();
        assert!(stats.misses >= 2);
    }
}
