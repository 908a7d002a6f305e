//! Shared fixture: a `Filesystem` wired to a fresh `MemoryBackend` and
//! default-sized caches, for use by every operation-group test file.

use std::sync::Arc;
use std::time::Duration;

use s3fs::backend::memory::MemoryBackend;
use s3fs::cache_manager::CacheManager;
use s3fs::fs::{Filesystem, FsConfig};

pub fn new_fs() -> Filesystem<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    let caches = Arc::new(CacheManager::new(1000, Duration::from_secs(300), 256, 4096));
    Filesystem::new(backend, caches, FsConfig::default())
}
