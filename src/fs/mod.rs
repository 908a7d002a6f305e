//! Filesystem core: translates POSIX-shaped operations into backend calls,
//! consulting the stat cache and FD cache, implementing the buffering,
//! flush, and upload policy, and encoding/decoding metadata.
//!
//! Every method here takes the observed path as the kernel (or a caller)
//! hands it — leading slash, trailing slash for an explicit directory
//! reference. Backend calls normalize internally; see [`crate::path`].

mod attr_ops;
mod mkdir_rmdir;
mod misc;
mod read_write;
mod rename;
mod symlink;

pub use misc::Statfs;

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Attr, Backend, Metadata};
use crate::cache_manager::CacheManager;
use crate::error::{Error, Result};
use crate::path;
use crate::stat_cache::CachedValue;

/// POSIX file-type bits within `mode`.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

const DIR_SIZE: i64 = 4096;
const FRESHNESS_WINDOW: Duration = Duration::from_millis(50);

/// Tunables the filesystem core needs beyond what the caches own.
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub page_size: u64,
    pub max_dirty_data: i64,
    pub enable_file_lock: bool,
    pub uid: u32,
    pub gid: u32,
    pub statfs_block_size: u32,
    pub statfs_blocks: u64,
    pub statfs_inodes: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            page_size: crate::fd::entity::DEFAULT_PAGE_SIZE,
            max_dirty_data: 10 * 1024 * 1024,
            enable_file_lock: false,
            uid: 0,
            gid: 0,
            statfs_block_size: 4096,
            statfs_blocks: 1 << 30,
            statfs_inodes: 1 << 20,
        }
    }
}

/// One entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// The filesystem core, generic over any [`Backend`] implementation.
pub struct Filesystem<B: Backend> {
    pub backend: Arc<B>,
    pub caches: Arc<CacheManager>,
    pub config: FsConfig,
}

impl<B: Backend> Filesystem<B> {
    pub fn new(backend: Arc<B>, caches: Arc<CacheManager>, config: FsConfig) -> Self {
        Self { backend, caches, config }
    }

    fn synth_dir_attr(&self, mtime: std::time::SystemTime) -> Attr {
        Attr { mode: S_IFDIR | 0o755, size: DIR_SIZE, mtime, uid: self.config.uid, gid: self.config.gid }
    }

    async fn mode_uid_gid_or_default(&self, path: &str, default_mode: u32) -> (u32, u32, u32) {
        match self.caches.stat.get(path) {
            Some(CachedValue::Attr { attr, .. }) => (attr.mode, attr.uid, attr.gid),
            _ => (default_mode, self.config.uid, self.config.gid),
        }
    }

    /// Resolve attributes for `path` per the cache/entity/backend precedence
    /// order, caching a successful result before returning.
    pub async fn get_attr(&self, path: &str) -> Result<Attr> {
        if let Some(entity) = self.caches.fd.get(path) {
            if entity.bytes_modified() > 0 {
                let (mode, uid, gid) = self.mode_uid_gid_or_default(path, S_IFREG | 0o644).await;
                return Ok(Attr { mode, size: entity.size() as i64, mtime: entity.mtime(), uid, gid });
            }
            if entity.since_last_write() <= FRESHNESS_WINDOW && self.caches.stat.get(path).is_none() {
                if let Ok(backend_attr) = self.backend.get_attr(&path::normalize(path)).await {
                    if entity.mtime() > backend_attr.mtime {
                        return Ok(Attr {
                            mode: backend_attr.mode,
                            size: entity.size() as i64,
                            mtime: entity.mtime(),
                            uid: backend_attr.uid,
                            gid: backend_attr.gid,
                        });
                    }
                }
            }
        }

        if let Some(CachedValue::Attr { attr, .. }) = self.caches.stat.get(path) {
            return Ok(attr);
        }

        if path::is_root(path) || path::is_directory_ref(path) {
            let keep = path::keep_marker(path);
            if let Ok(keep_attr) = self.backend.get_attr(&path::normalize(&keep)).await {
                let attr = Attr {
                    mode: S_IFDIR | (keep_attr.mode & 0o7777),
                    size: DIR_SIZE,
                    mtime: keep_attr.mtime,
                    uid: keep_attr.uid,
                    gid: keep_attr.gid,
                };
                self.caches.stat.set(path, attr, Metadata::new());
                return Ok(attr);
            }
            let attr = self.synth_dir_attr(std::time::SystemTime::now());
            self.caches.stat.set(path, attr, Metadata::new());
            return Ok(attr);
        }

        match self.backend.get_attr(&path::normalize(path)).await {
            Ok(attr) => {
                self.caches.stat.set(path, attr, Metadata::new());
                Ok(attr)
            }
            Err(crate::backend::BackendError::NotFound) => {
                let prefix = path::directory_prefix(path);
                let keys = self.backend.list(&prefix).await.map_err(Error::from)?;
                if keys.is_empty() {
                    Err(Error::NotFound)
                } else {
                    let attr = self.synth_dir_attr(std::time::SystemTime::now());
                    self.caches.stat.set(path, attr, Metadata::new());
                    Ok(attr)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List the immediate children of a directory, deduplicated by first
    /// path component. `.keep` is a visible entry, not filtered.
    pub async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let prefix = path::directory_prefix(path);
        let keys = self.backend.list(&prefix).await.map_err(Error::from)?;

        let mut seen: std::collections::HashMap<String, bool> = std::collections::HashMap::new();
        for key in &keys {
            if let Some((name, is_dir)) = path::first_component(key, &prefix) {
                seen.entry(name).or_insert(is_dir);
            }
        }

        let observed_prefix =
            if path::is_root(path) { "/".to_string() } else { format!("{}/", path.trim_end_matches('/')) };
        for fd_path in self.caches.fd.paths_with_prefix(&observed_prefix) {
            if let Some(entity) = self.caches.fd.get(&fd_path) {
                if entity.bytes_modified() > 0 {
                    if let Some((name, is_dir)) = path::first_component(&fd_path, &observed_prefix) {
                        seen.entry(name).or_insert(is_dir);
                    }
                }
            }
        }

        Ok(seen.into_iter().map(|(name, is_dir)| DirEntry { name, is_dir }).collect())
    }
}
