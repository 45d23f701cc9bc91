//! Keyed TTL cache with stale retention.
//!
//! # Responsibilities
//! - Hold immutable payloads with a per-entry expiry
//! - Report freshness on read; expired entries stay readable as stale
//! - Optionally bound memory by evicting the least recently used entry
//!
//! # Design Decisions
//! - Sharded concurrent map; values are `Arc<V>` so a reader sees the old or
//!   the new value, never a partial write
//! - No background sweep; expiry is evaluated on read
//! - Timestamps use `tokio::time::Instant` so tests can pause the clock

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A stored payload with its insertion time and time-to-live.
#[derive(Debug)]
struct CacheEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
    ttl: Duration,
    /// Logical access tick for LRU eviction.
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_fresh_at(&self, now: Instant) -> bool {
        match self.stored_at.checked_add(self.ttl) {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub struct Cached<V> {
    /// The stored payload.
    pub value: Arc<V>,
    /// Whether the entry is still within its TTL.
    pub fresh: bool,
    /// Time since the entry was stored.
    pub age: Duration,
}

/// Point-in-time entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
}

impl std::ops::Add for CacheStats {
    type Output = CacheStats;

    fn add(self, other: CacheStats) -> CacheStats {
        CacheStats {
            entries: self.entries + other.entries,
            fresh: self.fresh + other.fresh,
            stale: self.stale + other.stale,
        }
    }
}

/// Thread-safe TTL cache keyed by string.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    max_entries: Option<usize>,
    tick: AtomicU64,
}

impl<V> TtlCache<V> {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: None,
            tick: AtomicU64::new(0),
        }
    }

    /// Create a cache that evicts the least recently used entry once
    /// `max_entries` is exceeded.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: Some(max_entries.max(1)),
            tick: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Look up a key. Expired entries are returned with `fresh == false`.
    pub fn get(&self, key: &str) -> Option<Cached<V>> {
        let entry = self.entries.get(key)?;
        entry.last_access.store(self.next_tick(), Ordering::Relaxed);

        let now = Instant::now();
        Some(Cached {
            value: entry.value.clone(),
            fresh: entry.is_fresh_at(now),
            age: now.saturating_duration_since(entry.stored_at),
        })
    }

    /// Store a value, overwriting any previous entry and resetting its age.
    pub fn put(&self, key: impl Into<String>, value: V, ttl: Duration) -> Arc<V> {
        let value = Arc::new(value);
        let entry = CacheEntry {
            value: value.clone(),
            stored_at: Instant::now(),
            ttl,
            last_access: AtomicU64::new(self.next_tick()),
        };
        self.entries.insert(key.into(), entry);

        if let Some(max) = self.max_entries {
            while self.entries.len() > max {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }

        value
    }

    /// Return the fresh value for `key`, or run `compute` and store its result.
    ///
    /// Errors from `compute` are returned untouched and nothing is stored.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key) {
            if hit.fresh {
                return Ok(hit.value);
            }
        }

        let value = compute().await?;
        Ok(self.put(key, value, ttl))
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count fresh and stale entries.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            stats.entries += 1;
            if entry.is_fresh_at(now) {
                stats.fresh += 1;
            } else {
                stats.stale += 1;
            }
        }
        stats
    }

    fn evict_least_recent(&self) -> bool {
        // The iterator holds shard read locks; release them before removing.
        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.last_access.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match victim {
            Some(key) => {
                tracing::debug!(cache_key = %key, "Evicting least recently used cache entry");
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_fresh_then_stale_value_retained() {
        let cache = TtlCache::new();
        cache.put("quote:NSE:INFY", 42u32, Duration::from_secs(5));

        let hit = cache.get("quote:NSE:INFY").expect("entry present");
        assert!(hit.fresh);
        assert_eq!(*hit.value, 42);

        tokio::time::advance(Duration::from_secs(6)).await;

        let stale = cache.get("quote:NSE:INFY").expect("stale entry kept");
        assert!(!stale.fresh);
        assert_eq!(*stale.value, 42);
        assert!(stale.age >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_and_resets_age() {
        let cache = TtlCache::new();
        cache.put("k", "old", Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!cache.get("k").unwrap().fresh);

        cache.put("k", "new", Duration::from_secs(1));
        let hit = cache.get("k").unwrap();
        assert!(hit.fresh);
        assert_eq!(*hit.value, "new");
        assert_eq!(hit.age, Duration::ZERO);
    }

    #[test]
    fn test_missing_key() {
        let cache: TtlCache<u8> = TtlCache::new();
        assert!(cache.get("absent").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_compute_skips_compute_on_fresh_hit() {
        let cache = TtlCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k", Duration::from_secs(10), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        cache
            .get_or_compute("k", Duration::from_secs(10), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(8)
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*cache.get("k").unwrap().value, 8);
    }

    #[tokio::test]
    async fn test_get_or_compute_error_is_not_stored() {
        let cache: TtlCache<u32> = TtlCache::new();
        let result = cache
            .get_or_compute("k", Duration::from_secs(10), || async { Err("upstream down") })
            .await;
        assert_eq!(result.unwrap_err(), "upstream down");
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = TtlCache::with_max_entries(2);
        cache.put("a", 1, Duration::from_secs(60));
        cache.put("b", 2, Duration::from_secs(60));

        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.put("c", 3, Duration::from_secs(60));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_split_fresh_and_stale() {
        let cache = TtlCache::new();
        cache.put("short", 1, Duration::from_secs(1));
        cache.put("long", 2, Duration::from_secs(100));
        tokio::time::advance(Duration::from_secs(2)).await;

        let stats = cache.stats();
        assert_eq!(stats, CacheStats { entries: 2, fresh: 1, stale: 1 });
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(TtlCache::new());
        std::thread::scope(|scope| {
            for writer in 0..4u64 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for i in 0..500u64 {
                        cache.put(format!("k{}", i % 8), (writer, i), Duration::from_secs(30));
                    }
                });
            }
            for _ in 0..4 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for i in 0..500u64 {
                        if let Some(hit) = cache.get(&format!("k{}", i % 8)) {
                            let (writer, seq) = *hit.value;
                            assert!(writer < 4 && seq < 500);
                        }
                    }
                });
            }
        });
        assert_eq!(cache.len(), 8);
    }
}
