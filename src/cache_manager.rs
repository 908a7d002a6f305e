//! Bundles the stat cache and FD cache manager behind a single handle the
//! filesystem core holds, and owns their background sweep tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::fd::cache::{self, FdCacheManager};
use crate::stat_cache::{self, StatCache};

pub struct CacheManager {
    pub stat: Arc<StatCache>,
    pub fd: Arc<FdCacheManager>,
}

impl CacheManager {
    pub fn new(stat_max_size: usize, stat_ttl: Duration, fd_max_open: usize, page_size: u64) -> Self {
        Self {
            stat: Arc::new(StatCache::new(stat_max_size, stat_ttl)),
            fd: Arc::new(FdCacheManager::new(fd_max_open, page_size)),
        }
    }

    /// Invalidate any cached view of `path` in both caches' stat side. Does
    /// not touch FD entities; callers close those explicitly when the
    /// lifecycle calls for it.
    pub fn invalidate(&self, path: &str) {
        self.stat.delete(path);
    }

    /// Spawn both background sweepers; returns their handles so a caller
    /// (typically only tests) can abort them.
    pub fn spawn_sweepers(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        (stat_cache::spawn_sweeper(self.stat.clone()), cache::spawn_sweeper(self.fd.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_clears_stat_entry_only() {
        let mgr = CacheManager::new(10, Duration::from_secs(60), 10, 4096);
        mgr.stat.set(
            "/a",
            crate::backend::Attr {
                mode: 0o644,
                size: 0,
                mtime: std::time::SystemTime::now(),
                uid: 0,
                gid: 0,
            },
            crate::backend::Metadata::new(),
        );
        mgr.fd.open("/a", 0, std::time::SystemTime::now());
        mgr.invalidate("/a");
        assert!(mgr.stat.get("/a").is_none());
        assert!(mgr.fd.get("/a").is_some());
    }
}
