//! TTL-bounded, LRU-evicting `path -> attributes+user-metadata+symlink-target`
//! cache (the "path tree" component).
//!
//! Backed by a [`DashMap`] so readers never block each other; the eviction
//! scan when the cache is over capacity walks the map once, which is fine
//! at the default 1000-entry cap and keeps the "first scanned entry wins on
//! a last-access tie" behavior honest (deterministic only up to the map's
//! iteration order, as the contract allows).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::backend::{Attr, Metadata};

const DEFAULT_MAX_SIZE: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// What a stat-cache entry holds: either an attribute/metadata pair, or a
/// symlink target. Never both (spec: "never meaningfully" both).
#[derive(Clone)]
pub enum CachedValue {
    Attr { attr: Attr, metadata: Metadata },
    Symlink { target: String },
}

struct Entry {
    value: CachedValue,
    expires_at: Instant,
    last_access: Instant,
}

/// TTL/LRU stat cache.
pub struct StatCache {
    entries: DashMap<String, Entry>,
    max_size: AtomicUsize,
    ttl: RwLock<Duration>,
}

impl Default for StatCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl StatCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self { entries: DashMap::new(), max_size: AtomicUsize::new(max_size), ttl: RwLock::new(ttl) }
    }

    /// Returns the entry only if it has not expired; refreshes `last_access`
    /// on a hit.
    pub fn get(&self, path: &str) -> Option<CachedValue> {
        let now = Instant::now();
        let mut remove = false;
        let result = self.entries.get_mut(path).and_then(|mut entry| {
            if entry.expires_at <= now {
                remove = true;
                None
            } else {
                entry.last_access = now;
                Some(entry.value.clone())
            }
        });
        if remove {
            self.entries.remove(path);
        }
        result
    }

    /// Cache a successful attribute lookup.
    pub fn set(&self, path: &str, attr: Attr, metadata: Metadata) {
        self.insert(path, CachedValue::Attr { attr, metadata });
    }

    /// Cache a symlink target.
    pub fn set_symlink(&self, path: &str, target: String) {
        self.insert(path, CachedValue::Symlink { target });
    }

    fn insert(&self, path: &str, value: CachedValue) {
        let max_size = self.max_size.load(Ordering::Relaxed);
        if !self.entries.contains_key(path) {
            self.evict_to(max_size.saturating_sub(1));
        }
        let now = Instant::now();
        let ttl = *self.ttl.read().expect("lock poisoned");
        self.entries.insert(
            path.to_string(),
            Entry { value, expires_at: now + ttl, last_access: now },
        );
    }

    pub fn delete(&self, path: &str) {
        self.entries.remove(path);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Truncate immediately to the new cap.
    pub fn set_max_size(&self, n: usize) {
        self.max_size.store(n, Ordering::Relaxed);
        self.evict_to(n);
    }

    /// Takes effect for subsequent `set`/`set_symlink` calls only.
    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.write().expect("lock poisoned") = ttl;
    }

    pub fn ttl(&self) -> Duration {
        *self.ttl.read().expect("lock poisoned")
    }

    /// Remove entries whose `expires_at` has already passed. Intended to be
    /// driven by a periodic background task at `ttl / 2`.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    fn evict_to(&self, cap: usize) {
        while self.entries.len() > cap {
            let victim = self
                .entries
                .iter()
                .min_by_key(|e| e.last_access)
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spawn the periodic expiry sweep at `ttl / 2`. Returns the task handle so
/// callers can abort it on shutdown.
pub fn spawn_sweeper(cache: std::sync::Arc<StatCache>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = cache.ttl() / 2;
            tokio::time::sleep(interval.max(Duration::from_millis(1))).await;
            cache.sweep_expired();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn dummy_attr() -> Attr {
        Attr { mode: 0o644, size: 0, mtime: SystemTime::now(), uid: 0, gid: 0 }
    }

    #[test]
    fn hit_refreshes_last_access_and_returns_value() {
        let cache = StatCache::new(10, Duration::from_secs(60));
        cache.set("/a", dummy_attr(), Metadata::new());
        assert!(matches!(cache.get("/a"), Some(CachedValue::Attr { .. })));
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = StatCache::new(10, Duration::from_millis(1));
        cache.set("/a", dummy_attr(), Metadata::new());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("/a").is_none());
    }

    #[test]
    fn set_max_size_truncates_immediately() {
        let cache = StatCache::new(10, Duration::from_secs(60));
        for i in 0..5 {
            cache.set(&format!("/{i}"), dummy_attr(), Metadata::new());
        }
        assert_eq!(cache.len(), 5);
        cache.set_max_size(2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn insert_over_cap_evicts_oldest_last_access() {
        let cache = StatCache::new(2, Duration::from_secs(60));
        cache.set("/a", dummy_attr(), Metadata::new());
        std::thread::sleep(Duration::from_millis(2));
        cache.set("/b", dummy_attr(), Metadata::new());
        std::thread::sleep(Duration::from_millis(2));
        cache.set("/c", dummy_attr(), Metadata::new());
        assert!(cache.get("/a").is_none());
        assert!(cache.get("/b").is_some());
        assert!(cache.get("/c").is_some());
    }

    #[test]
    fn delete_and_clear() {
        let cache = StatCache::new(10, Duration::from_secs(60));
        cache.set("/a", dummy_attr(), Metadata::new());
        cache.delete("/a");
        assert!(cache.get("/a").is_none());
        cache.set("/b", dummy_attr(), Metadata::new());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn symlink_value_round_trips() {
        let cache = StatCache::new(10, Duration::from_secs(60));
        cache.set_symlink("/link", "/target".to_string());
        match cache.get("/link") {
            Some(CachedValue::Symlink { target }) => assert_eq!(target, "/target"),
            _ => panic!("expected symlink entry"),
        }
    }
}
