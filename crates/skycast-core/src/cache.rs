//! In-memory TTL cache with lazy expiry.
//!
//! Keys are opaque strings, payloads are opaque to the cache. Expiry is
//! checked on read: an expired entry is deleted when observed, not on a
//! background schedule. `clear_expired` is the only proactive sweep.
//!
//! The map is guarded by a single mutex; the access pattern is small and
//! short-lived, so no finer-grained locking is needed.

use std::any::Any;
use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::now_ms;

/// Default entry lifetime: 30 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(1_800_000);

struct CacheEntry {
    data: Box<dyn Any + Send + Sync>,
    #[allow(dead_code)]
    timestamp: i64,
    expires_at: i64,
}

impl CacheEntry {
    fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Single-process TTL cache keyed by string.
///
/// `get` never returns expired data. A `None` from `get` does not
/// distinguish "never set" from "expired"; both look absent to the caller.
pub struct CacheManager {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl CacheManager {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Store `data` under `key`, overwriting any existing entry.
    ///
    /// The entry expires `ttl` (or the default TTL) from now.
    pub fn set<T>(&self, key: &str, data: T, ttl: Option<Duration>)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.set_at(key, data, ttl, now_ms());
    }

    fn set_at<T>(&self, key: &str, data: T, ttl: Option<Duration>, now: i64)
    where
        T: Clone + Send + Sync + 'static,
    {
        let ttl_ms = ttl.unwrap_or(self.default_ttl).as_millis() as i64;
        self.entries.lock().insert(
            key.to_string(),
            CacheEntry {
                data: Box::new(data),
                timestamp: now,
                expires_at: now + ttl_ms,
            },
        );
    }

    /// Fetch a fresh entry, or `None` if absent, expired, or of another type.
    ///
    /// Observing an expired entry deletes it as a side effect.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_at(key, now_ms())
    }

    fn get_at<T>(&self, key: &str, now: i64) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if entry.is_expired(now) {
            entries.remove(key);
            return None;
        }
        entry.data.downcast_ref::<T>().cloned()
    }

    /// Whether a fresh entry exists for `key`. Same expiry side effect as `get`.
    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, now_ms())
    }

    fn has_at(&self, key: &str, now: i64) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove an entry. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Sweep every expired entry; returns the count removed.
    pub fn clear_expired(&self) -> usize {
        self.clear_expired_at(now_ms())
    }

    fn clear_expired_at(&self, now: i64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Current entry count, including expired entries not yet swept.
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }
}
