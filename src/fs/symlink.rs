//! `Symlink` / `Readlink`, and the unconditionally-unsupported `Link` /
//! `Mknod`.

use std::time::SystemTime;

use crate::backend::{Backend, Metadata};
use crate::error::{Error, Result};
use crate::stat_cache::CachedValue;
use crate::{metadata, path};

use super::{Filesystem, S_IFLNK};

impl<B: Backend> Filesystem<B> {
    pub async fn symlink(&self, target: &str, newpath: &str) -> Result<()> {
        if self.backend.exists(&path::normalize(newpath)).await {
            return Err(Error::AlreadyExists);
        }
        let now = SystemTime::now();
        let mut meta = Metadata::new();
        metadata::PosixAttr {
            mode: S_IFLNK | 0o777,
            uid: self.config.uid,
            gid: self.config.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
        .merge_into(&mut meta);
        self.backend
            .write_with_metadata(&path::normalize(newpath), target.as_bytes().to_vec(), meta)
            .await?;
        self.caches.stat.set_symlink(newpath, target.to_string());
        Ok(())
    }

    pub async fn readlink(&self, path: &str) -> Result<String> {
        if let Some(CachedValue::Symlink { target }) = self.caches.stat.get(path) {
            return Ok(target);
        }
        let bytes = self.backend.read(&crate::path::normalize(path)).await?;
        let target = String::from_utf8_lossy(&bytes).trim().to_string();
        self.caches.stat.set_symlink(path, target.clone());
        Ok(target)
    }

    pub async fn link(&self) -> Result<()> {
        Err(Error::NotSupported)
    }

    pub async fn mknod(&self) -> Result<()> {
        Err(Error::NotSupported)
    }
}
