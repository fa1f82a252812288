//! In-process TTL cache with tag invalidation.
//!
//! Entries expire two ways:
//!
//! - **Eagerly**: every `set` spawns a tokio timer that removes the entry
//!   when its TTL elapses (only when a runtime is available).
//! - **Lazily**: every read checks the entry's age against the injected
//!   [`Clock`] and purges it if expired.
//!
//! The read-time check is the correctness backstop; the timer only keeps
//! memory from holding dead entries nobody reads. Each entry carries a
//! generation number, so a timer that fires late can never remove a newer
//! entry stored under the same key.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::clock::{Clock, TokioClock};
use super::options::{CacheConfig, CacheOptions};

/// Introspection snapshot returned by [`TtlCache::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because their TTL elapsed (timer or read check).
    pub expirations: u64,
}

impl CacheCounters {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    tags: HashSet<String>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct CacheInner<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    next_generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl<V> CacheInner<V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Every critical section leaves the map consistent, so a panic in
        // another holder does not invalidate it.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback: remove `key` only if it still holds `generation`.
    fn expire(&self, key: &str, generation: u64) {
        let mut entries = self.lock();
        if entries.get(key).is_some_and(|e| e.generation == generation) {
            entries.remove(key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, "cache entry expired by timer");
        }
    }
}

impl<V> Drop for CacheInner<V> {
    fn drop(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.values_mut() {
            entry.cancel_timer();
        }
    }
}

/// Process-local memoization layer for remote reads.
///
/// Cloning yields another handle to the same store; pass it around by
/// injection rather than as a global.
pub struct TtlCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("size", &self.len())
            .field("default_ttl", &self.inner.config.default_ttl)
            .finish()
    }
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache using tokio's clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                clock,
                config,
                next_generation: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                expirations: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Store `value` under `key`, replacing any previous entry and its timer.
    pub fn set(&self, key: impl Into<String>, value: V, options: &CacheOptions) {
        let key = key.into();
        let ttl = options.effective_ttl(self.inner.config.default_ttl);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let timer = self.spawn_expiry(key.clone(), generation, ttl);

        let entry = CacheEntry {
            value,
            inserted_at: self.inner.clock.now(),
            ttl,
            tags: options.tags.iter().cloned().collect(),
            generation,
            timer,
        };

        let mut entries = self.inner.lock();
        if let Some(mut old) = entries.insert(key, entry) {
            old.cancel_timer();
        }
    }

    fn spawn_expiry(&self, key: String, generation: u64, ttl: Duration) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let weak: Weak<CacheInner<V>> = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&key, generation);
            }
        }))
    }

    /// Fetch a live value. Expired entries are purged and reported as absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.inner.clock.now();
        let mut entries = self.inner.lock();

        let expired = match entries.get(key) {
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            if let Some(mut entry) = entries.remove(key) {
                entry.cancel_timer();
            }
            self.inner.expirations.fetch_add(1, Ordering::Relaxed);
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.inner.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Remove `key`. Returns whether an entry existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut entries = self.inner.lock();
        match entries.remove(key) {
            Some(mut entry) => {
                entry.cancel_timer();
                true
            }
            None => false,
        }
    }

    /// Remove every entry tagged with `tag`. Returns how many were removed.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut entries = self.inner.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.tags.contains(tag))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            if let Some(mut entry) = entries.remove(key) {
                entry.cancel_timer();
            }
        }

        if !doomed.is_empty() {
            tracing::debug!(tag, removed = doomed.len(), "cache invalidated by tag");
        }
        doomed.len()
    }

    /// Remove everything and cancel all timers.
    pub fn clear(&self) {
        let mut entries = self.inner.lock();
        for (_, mut entry) in entries.drain() {
            entry.cancel_timer();
        }
    }

    /// Tear the cache down. Other handles see an empty cache afterwards.
    pub fn dispose(&self) {
        self.clear();
    }

    /// Key listing for diagnostics. Does not purge expired entries.
    pub fn stats(&self) -> CacheSnapshot {
        let entries = self.inner.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheSnapshot {
            size: keys.len(),
            keys,
        }
    }

    pub fn counters(&self) -> CacheCounters {
        CacheCounters {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            expirations: self.inner.expirations.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
