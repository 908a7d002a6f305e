//! `Mkdir`, `Rmdir`, `Create`, `Remove`.

use std::time::SystemTime;

use crate::backend::{Backend, Metadata};
use crate::error::{Error, Result};
use crate::{metadata, path};

use super::{Filesystem, S_IFDIR, S_IFMT, S_IFREG};

impl<B: Backend> Filesystem<B> {
    pub async fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        if let Ok(attr) = self.get_attr(path).await {
            if attr.mode & S_IFMT == S_IFDIR {
                return Err(Error::AlreadyExists);
            }
        }
        let now = SystemTime::now();
        let mut meta = Metadata::new();
        metadata::PosixAttr {
            mode: mode & 0o7777,
            uid: self.config.uid,
            gid: self.config.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
        .merge_into(&mut meta);
        let keep = path::keep_marker(path);
        self.backend.write_with_metadata(&path::normalize(&keep), Vec::new(), meta).await?;
        self.caches.invalidate(path);
        Ok(())
    }

    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let attr = self.get_attr(path).await?;
        if attr.mode & S_IFMT != S_IFDIR {
            return Err(Error::NotADirectory);
        }
        let entries = self.read_dir(path).await?;
        if entries.iter().any(|e| e.name != ".keep") {
            return Err(Error::NotEmpty);
        }
        let keep = path::keep_marker(path);
        match self.backend.delete(&path::normalize(&keep)).await {
            Ok(()) => {}
            Err(crate::backend::BackendError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        self.caches.invalidate(path);
        self.caches.fd.remove(path);
        Ok(())
    }

    pub async fn create(&self, path: &str, mode: u32) -> Result<()> {
        if self.backend.exists(&path::normalize(path)).await {
            return Err(Error::AlreadyExists);
        }
        let now = SystemTime::now();
        let mut meta = Metadata::new();
        metadata::PosixAttr {
            mode: S_IFREG | (mode & 0o7777),
            uid: self.config.uid,
            gid: self.config.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
        .merge_into(&mut meta);
        self.backend.write_with_metadata(&path::normalize(path), Vec::new(), meta).await?;
        self.caches.invalidate(path);
        Ok(())
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        self.get_attr(path).await?;
        self.caches.fd.remove(path);
        self.backend.delete(&path::normalize(path)).await?;
        self.caches.invalidate(path);
        Ok(())
    }
}
