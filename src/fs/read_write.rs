//! `ReadFile` / `WriteFile` and the upload materialization, flush, fsync,
//! release, and opendir operations built on them.

use std::time::SystemTime;

use crate::backend::{Backend, Metadata};
use crate::error::{Error, Result};
use crate::fd::FdEntity;
use crate::{metadata, path};

use super::{Filesystem, S_IFDIR, S_IFMT, S_IFREG};

impl<B: Backend> Filesystem<B> {
    /// Read `size` bytes at `offset` (`size == 0` means "to EOF").
    pub async fn read_file(&self, path: &str, offset: u64, size: u64) -> Result<Vec<u8>> {
        if let Some(entity) = self.caches.fd.get(path) {
            let _guard =
                if self.config.enable_file_lock { Some(entity.advisory.read().await) } else { None };
            let len = if size == 0 { entity.size().saturating_sub(offset) } else { size };
            if entity.is_dirty() || entity.has_scratch_file() {
                return Ok(entity.read_buffered(offset, len).await);
            }
            // Page-cache hit for a clean entity: only serve it when every
            // byte in range is already cached, else fall through to the
            // backend below.
            if let Some(bytes) = entity.read_page(offset, len) {
                return Ok(bytes);
            }
        }

        let norm = path::normalize(path);
        let bytes = if size == 0 {
            self.backend.read_range(&norm, offset, 0).await.map_err(Error::from)?
        } else {
            self.backend.read_range(&norm, offset, offset + size - 1).await.map_err(Error::from)?
        };

        match self.caches.fd.get(path) {
            Some(entity) => {
                entity.write_page(offset, &bytes);
                entity.mark_clean();
            }
            None => {
                if let Ok(attr) = self.backend.get_attr(&norm).await {
                    let entity = self.caches.fd.open(path, attr.size as u64, attr.mtime);
                    entity.write_page(offset, &bytes);
                    entity.mark_clean();
                    self.caches.fd.close(path);
                }
            }
        }
        Ok(bytes)
    }

    /// Buffer (or, per the upload policy, immediately materialize) a write
    /// at `offset`. Returns the resulting file size.
    pub async fn write_file(&self, path: &str, data: &[u8], offset: u64) -> Result<u64> {
        let norm = path::normalize(path);
        let pre_size = self.get_attr(path).await.map(|a| a.size as u64).unwrap_or(0);

        let entity = self.caches.fd.open(path, pre_size, SystemTime::now());
        let _guard =
            if self.config.enable_file_lock { Some(entity.advisory.write().await) } else { None };

        entity.write_page(offset, data);
        entity.set_mtime(SystemTime::now());

        let new_size =
            if offset == 0 { data.len() as u64 } else { pre_size.max(offset + data.len() as u64) };
        entity.set_size(new_size);

        let should_upload = offset == 0
            || new_size > pre_size
            || entity.bytes_modified() >= self.config.max_dirty_data;

        let result =
            if should_upload { self.upload_entity(path, &norm, &entity).await } else { Ok(()) };

        self.caches.fd.close(path);
        result?;
        Ok(new_size)
    }

    /// Materialize an entity's buffered bytes into a whole-object
    /// `WriteWithMetadata`, preserving existing mode/uid/gid metadata and
    /// stamping fresh mtime/ctime. Clears dirty state only on success.
    pub(super) async fn upload_entity(
        &self,
        observed_path: &str,
        norm_path: &str,
        entity: &std::sync::Arc<FdEntity>,
    ) -> Result<()> {
        let mut meta = self.backend.get_metadata(norm_path).await.unwrap_or_default();
        let now = SystemTime::now();
        meta.insert("mtime".to_string(), metadata::encode_time(now));
        meta.insert("ctime".to_string(), metadata::encode_time(now));
        meta.entry("mode".to_string()).or_insert_with(|| metadata::encode_mode(S_IFREG | 0o644));
        meta.entry("uid".to_string()).or_insert_with(|| metadata::encode_id(self.config.uid));
        meta.entry("gid".to_string()).or_insert_with(|| metadata::encode_id(self.config.gid));

        let backend = self.backend.clone();
        let norm_owned = norm_path.to_string();
        entity
            .upload_buffered(move |buf| async move {
                backend.write_with_metadata(&norm_owned, buf, meta).await
            })
            .await
            .map_err(Error::from)?;

        entity.set_mtime(now);
        self.caches.invalidate(observed_path);
        if let Ok(attr) = self.backend.get_attr(norm_path).await {
            self.caches.stat.set(observed_path, attr, Metadata::new());
        }
        Ok(())
    }

    /// Upload any buffered data for `path`, if there is any.
    pub(super) async fn flush_buffered(&self, path: &str) -> Result<()> {
        if let Some(entity) = self.caches.fd.get(path) {
            if entity.is_dirty() {
                let norm = path::normalize(path);
                self.upload_entity(path, &norm, &entity).await?;
            }
        }
        Ok(())
    }

    pub async fn flush(&self, path: &str) -> Result<()> {
        self.flush_buffered(path).await
    }

    pub async fn fsync(&self, path: &str, _datasync: bool) -> Result<()> {
        self.flush_buffered(path).await?;
        self.caches.invalidate(path);
        Ok(())
    }

    pub async fn release(&self, path: &str) -> Result<()> {
        self.flush_buffered(path).await?;
        self.caches.fd.close(path);
        Ok(())
    }

    pub async fn opendir(&self, path: &str) -> Result<()> {
        let attr = self.get_attr(path).await?;
        if attr.mode & S_IFMT != S_IFDIR {
            return Err(Error::NotADirectory);
        }
        Ok(())
    }

    /// Flush every entity with buffered data, then drop all tracked
    /// entities. Called once at mount teardown.
    pub async fn shutdown(&self) {
        for path in self.caches.fd.paths_with_prefix("") {
            if let Err(err) = self.flush_buffered(&path).await {
                tracing::warn!(path, ?err, "failed to flush buffered data during shutdown");
            }
        }
        self.caches.fd.close_all();
    }
}
