//! [`FdCacheManager`]: the `path -> FdEntity` registry, its open-handle
//! accounting, capacity eviction, and idle sweep.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::DashMap;

use super::entity::FdEntity;

pub const DEFAULT_MAX_OPEN: usize = 256;
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Tracks every currently-open cached file, keyed by normalized path.
///
/// `close` only decrements refcount: an entity is destroyed only when
/// capacity pressure evicts a refcount-zero entity in `open`, the periodic
/// idle sweep reaps one, or `close_all` runs at shutdown. This matches the
/// lifecycle table over a literal reading of `Close` as "remove once
/// refcount hits zero" — the latter would make the idle sweep pointless.
pub struct FdCacheManager {
    entities: DashMap<String, Arc<FdEntity>>,
    max_open: usize,
    page_size: u64,
}

impl FdCacheManager {
    pub fn new(max_open: usize, page_size: u64) -> Self {
        Self { entities: DashMap::new(), max_open, page_size }
    }

    /// Increment refcount on an existing entity for `path`, or construct one
    /// seeded with `size`/`mtime`. Evicts the least-recently-accessed
    /// refcount-zero entity first if at capacity.
    pub fn open(&self, path: &str, size: u64, mtime: SystemTime) -> Arc<FdEntity> {
        if let Some(entity) = self.entities.get(path) {
            entity.incref();
            entity.touch();
            return entity.clone();
        }

        if self.entities.len() >= self.max_open {
            self.evict_one_idle();
        }

        let entity = Arc::new(FdEntity::with_page_params(
            path,
            size,
            mtime,
            self.page_size,
            super::entity::DEFAULT_PAGE_CAP,
        ));
        entity.incref();
        self.entities.insert(path.to_string(), entity.clone());
        entity
    }

    /// Peek at an entity without affecting its refcount.
    pub fn get(&self, path: &str) -> Option<Arc<FdEntity>> {
        self.entities.get(path).map(|e| e.clone())
    }

    /// Decrement refcount for `path`. Does not itself evict the entity.
    pub fn close(&self, path: &str) {
        if let Some(entity) = self.entities.get(path) {
            entity.decref();
        }
    }

    /// Remove the cache entry for `path` outright (used after a rename or
    /// remove, where the old path must not linger).
    pub fn remove(&self, path: &str) -> Option<Arc<FdEntity>> {
        self.entities.remove(path).map(|(_, e)| e)
    }

    fn evict_one_idle(&self) {
        let victim = self
            .entities
            .iter()
            .filter(|e| e.refcount() <= 0)
            .min_by_key(|e| e.last_access())
            .map(|e| e.key().clone());
        if let Some(path) = victim {
            self.entities.remove(&path);
        }
    }

    /// Remove every entity with refcount 0 whose last access is older than
    /// the idle timeout. Intended to run on a periodic background task.
    pub fn sweep_idle(&self) {
        let cutoff = Instant::now() - IDLE_TIMEOUT;
        self.entities.retain(|_, e| !(e.refcount() <= 0 && e.last_access() < cutoff));
    }

    /// Close every tracked entity regardless of refcount, used at shutdown
    /// after buffered data has been flushed.
    pub fn close_all(&self) {
        self.entities.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entities.iter().filter(|e| e.key().starts_with(prefix)).map(|e| e.key().clone()).collect()
    }
}

/// Spawn the periodic idle-entity sweep (30s interval, 1h idle threshold).
pub fn spawn_sweeper(manager: Arc<FdCacheManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(IDLE_SWEEP_INTERVAL).await;
            manager.sweep_idle();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_twice_increments_refcount() {
        let mgr = FdCacheManager::new(10, 4096);
        let a = mgr.open("/a", 0, SystemTime::now());
        let b = mgr.open("/a", 0, SystemTime::now());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.refcount(), 2);
    }

    #[test]
    fn close_decrements_but_does_not_evict() {
        let mgr = FdCacheManager::new(10, 4096);
        let entity = mgr.open("/a", 0, SystemTime::now());
        mgr.close("/a");
        assert_eq!(entity.refcount(), 0);
        assert!(mgr.get("/a").is_some());
    }

    #[test]
    fn capacity_pressure_evicts_lru_zero_refcount_entity() {
        let mgr = FdCacheManager::new(1, 4096);
        let a = mgr.open("/a", 0, SystemTime::now());
        mgr.close("/a");
        drop(a);
        let _b = mgr.open("/b", 0, SystemTime::now());
        assert!(mgr.get("/a").is_none());
        assert!(mgr.get("/b").is_some());
    }

    #[test]
    fn remove_drops_entity_immediately() {
        let mgr = FdCacheManager::new(10, 4096);
        mgr.open("/a", 0, SystemTime::now());
        assert!(mgr.remove("/a").is_some());
        assert!(mgr.get("/a").is_none());
    }

    #[test]
    fn paths_with_prefix_filters() {
        let mgr = FdCacheManager::new(10, 4096);
        mgr.open("/dir/a", 0, SystemTime::now());
        mgr.open("/dir/b", 0, SystemTime::now());
        mgr.open("/other", 0, SystemTime::now());
        let mut paths = mgr.paths_with_prefix("/dir/");
        paths.sort();
        assert_eq!(paths, vec!["/dir/a".to_string(), "/dir/b".to_string()]);
    }
}
