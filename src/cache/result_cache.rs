//! TTL result cache with glob invalidation and a background sweeper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::keys::glob_match;

/// A cached value and its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    /// `None` when the TTL is too large to represent; the entry never expires.
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    /// An entry is logically absent once `now` is past `expires_at`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries currently stored, expired-but-unswept ones included.
    pub size: usize,
    /// Entries removed because they expired.
    pub evictions: u64,
}

struct Shared<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> Shared<V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

struct Sweeper {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// A string-keyed memo store whose entries expire after a TTL.
///
/// Safe to share between threads. Operations never fail: a poisoned lock is
/// recovered and a miss simply means the caller must compute.
pub struct ResultCache<V> {
    shared: Arc<Shared<V>>,
    default_ttl: Duration,
    sweeper: Mutex<Option<Sweeper>>,
}

impl<V: Clone + Send + 'static> ResultCache<V> {
    /// Create a cache without a background sweeper.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
            default_ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// Create a cache and start sweeping expired entries every `interval`.
    pub fn with_sweeper(default_ttl: Duration, interval: Duration) -> Self {
        let cache = Self::new(default_ttl);
        cache.start_sweeper(interval);
        cache
    }

    /// Start the background sweeper. No-op if one is already running.
    pub fn start_sweeper(&self, interval: Duration) {
        let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }

        let (stop, stopped) = mpsc::channel::<()>();
        let shared: Weak<Shared<V>> = Arc::downgrade(&self.shared);
        let handle = std::thread::Builder::new()
            .name("result-cache-sweeper".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(shared) = shared.upgrade() else {
                            break;
                        };
                        let removed = shared.sweep();
                        if removed > 0 {
                            log::debug!("cache sweep evicted {} expired entries", removed);
                        }
                    }
                    // Stop requested or the cache was dropped.
                    _ => break,
                }
            });

        match handle {
            Ok(handle) => *slot = Some(Sweeper { stop, handle }),
            Err(e) => log::warn!("cache sweeper not started: {}", e),
        }
    }

    /// Stop the background sweeper and wait for it to exit.
    pub fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.stop.send(());
            if sweeper.handle.join().is_err() {
                log::warn!("cache sweeper panicked");
            }
        }
    }

    /// Whether a background sweeper is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// TTL used by [`ResultCache::set_default`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry. Expired entries are evicted and count as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.shared.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.shared.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
            self.shared.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value, replacing any existing entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let created_at = Instant::now();
        let entry = CacheEntry {
            value,
            created_at,
            expires_at: created_at.checked_add(ttl),
        };
        self.shared.lock().insert(key.into(), entry);
    }

    /// Store a value with the default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove one key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.shared.lock().remove(key).is_some()
    }

    /// Remove every key matching `pattern` (`*` matches any substring).
    pub fn delete_pattern(&self, pattern: &str) -> usize {
        let mut entries = self.shared.lock();
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        let removed = before - entries.len();
        log::debug!("cache invalidated {} keys matching {:?}", removed, pattern);
        removed
    }

    /// Return the cached value, or compute, store and return it.
    ///
    /// The lock is not held while `compute` runs, so concurrent callers
    /// missing on the same key may each compute; the last write wins.
    pub fn get_or_set<F>(&self, key: &str, compute: F, ttl: Duration) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.set(key, value.clone(), ttl);
        value
    }

    /// Like [`ResultCache::get_or_set`] for fallible computations.
    /// Errors are returned to the caller and nothing is stored.
    pub fn try_get_or_set<F, E>(&self, key: &str, compute: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Evict every expired entry now. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.shared.lock().clear();
    }

    /// Number of stored entries, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the diagnostic counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            size: self.len(),
            evictions: self.shared.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<V> Drop for ResultCache<V> {
    fn drop(&mut self) {
        let sweeper = self
            .sweeper
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.stop.send(());
            let _ = sweeper.handle.join();
        }
    }
}
