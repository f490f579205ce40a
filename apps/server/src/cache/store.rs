//! In-memory result cache with time-based expiry

use crate::db::QueryResult;
use crate::metrics::{self, CacheLookup};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CacheEntry {
    value: Arc<QueryResult>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// Process-wide cache of query results.
///
/// Created once per process (or once per test) and shared behind an `Arc`.
/// Entries expire lazily: an expired entry is removed the next time it is
/// read, by [`purge_expired`](Self::purge_expired), or by explicit
/// invalidation. Nothing is persisted across restarts and there is no
/// eviction beyond expiry.
///
/// Every invalidation advances a generation counter. Readers that snapshot
/// [`generation`](Self::generation) before querying and store through
/// [`put_if_generation`](Self::put_if_generation) never write back a result
/// that an invalidation has already superseded.
#[derive(Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache").finish_non_exhaustive()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. Expired entries count as a miss and are removed.
    pub async fn get(&self, key: &str) -> Option<Arc<QueryResult>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => {
                    metrics::record_cache_lookup(CacheLookup::Hit);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    metrics::record_cache_lookup(CacheLookup::Miss);
                    return None;
                }
            }
        }

        let mut entries = self.entries.write().await;
        // A concurrent put may have refreshed the entry since the read lock was released.
        if let Some(entry) = entries.get(key) {
            if entry.is_live(now) {
                metrics::record_cache_lookup(CacheLookup::Hit);
                return Some(entry.value.clone());
            }
            entries.remove(key);
            metrics::set_cache_entries(entries.len());
        }
        metrics::record_cache_lookup(CacheLookup::Expired);
        None
    }

    /// Store a value that expires after `ttl`, replacing any existing entry.
    pub async fn put(&self, key: impl Into<String>, value: Arc<QueryResult>, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), entry);
        metrics::set_cache_entries(entries.len());
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a value unless an invalidation happened after `generation` was read.
    ///
    /// Returns whether the value was stored.
    pub async fn put_if_generation(
        &self,
        key: impl Into<String>,
        value: Arc<QueryResult>,
        ttl: Duration,
        generation: u64,
    ) -> bool {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().await;
        // Invalidations bump the counter under this lock.
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        entries.insert(key.into(), entry);
        metrics::set_cache_entries(entries.len());
        true
    }

    fn advance_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Remove a single key. Returns whether it was present.
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut entries = self.entries.write().await;
        self.advance_generation();
        let removed = entries.remove(key).is_some();
        if removed {
            metrics::record_invalidations(1);
            metrics::set_cache_entries(entries.len());
        }
        removed
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Used after a write that affects a family of cached reads. Returns the
    /// number of removed entries.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        self.advance_generation();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        metrics::record_invalidations(removed);
        metrics::set_cache_entries(entries.len());
        tracing::debug!(prefix, removed, "Invalidated cache entries");
        removed
    }

    /// Drop every expired entry. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        metrics::set_cache_entries(entries.len());
        before - entries.len()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        self.advance_generation();
        entries.clear();
        metrics::set_cache_entries(0);
    }

    /// Whether a live entry exists for `key`. Does not touch hit/miss counters.
    pub async fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Sweep expired entries every `interval` until the cache is dropped.
    pub fn spawn_purge_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(strong) = cache.upgrade() else {
                    break;
                };
                let purged = strong.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired cache entries");
                }
            }
        })
    }
}
