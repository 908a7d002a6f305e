//! `Rename`: a single backend copy-then-delete for a file, or a
//! non-atomic loop of per-key renames for a directory.

use crate::backend::Backend;
use crate::error::Result;
use crate::path;

use super::{Filesystem, S_IFDIR, S_IFMT};

impl<B: Backend> Filesystem<B> {
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.flush_buffered(old).await?;
        let attr = self.get_attr(old).await?;

        if attr.mode & S_IFMT == S_IFDIR {
            let prefix = path::directory_prefix(old);
            let new_prefix = path::directory_prefix(new);
            let keys = self.backend.list(&prefix).await?;
            for key in keys {
                let rel = key.strip_prefix(&prefix).unwrap_or(&key);
                let observed_old = format!("{}/{}", old.trim_end_matches('/'), rel);
                self.flush_buffered(&observed_old).await.ok();
                let new_key = format!("{new_prefix}{rel}");
                self.backend.rename(&key, &new_key).await?;
                self.caches.invalidate(&observed_old);
                self.caches.fd.remove(&observed_old);
            }
        } else {
            let norm_old = path::normalize(old);
            let norm_new = path::normalize(new);
            self.backend.rename(&norm_old, &norm_new).await?;
        }

        self.caches.invalidate(old);
        self.caches.invalidate(new);
        self.caches.fd.remove(old);
        Ok(())
    }
}
