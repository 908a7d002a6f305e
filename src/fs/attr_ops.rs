//! Metadata-only mutations: `Chmod`, `Chown`, `Utimens`, and extended
//! attributes. All of these are read-modify-write against the whole object
//! because the backend cannot mutate user-metadata in place.

use std::time::{Duration, SystemTime};

use crate::backend::{Backend, Metadata};
use crate::error::Result;
use crate::{metadata, path};

use super::{Filesystem, S_IFDIR, S_IFMT};

impl<B: Backend> Filesystem<B> {
    /// The key this path's metadata actually lives under: the path itself
    /// for a file, the directory's `.keep` marker for a directory.
    async fn marker_or_self(&self, path: &str) -> Result<String> {
        let attr = self.get_attr(path).await?;
        Ok(if attr.mode & S_IFMT == S_IFDIR { path::keep_marker(path) } else { path.to_string() })
    }

    /// Flush buffered data, load the object's current metadata, apply
    /// `edit`, bump `ctime` (strictly monotonic), optionally stamp `mtime`,
    /// and write the object back with its existing bytes.
    async fn mutate_object_metadata(
        &self,
        path: &str,
        mtime_override: Option<SystemTime>,
        edit: impl FnOnce(&mut Metadata),
    ) -> Result<()> {
        self.flush_buffered(path).await?;
        let target = self.marker_or_self(path).await?;
        let norm = path::normalize(&target);

        let mut meta = self.backend.get_metadata(&norm).await.unwrap_or_default();
        edit(&mut meta);

        let now = SystemTime::now();
        let prev_ctime = meta.get("ctime").and_then(|s| metadata::decode_time(s));
        let ctime = if prev_ctime == Some(now) { now + Duration::from_secs(1) } else { now };
        meta.insert("ctime".to_string(), metadata::encode_time(ctime));
        if let Some(mtime) = mtime_override {
            meta.insert("mtime".to_string(), metadata::encode_time(mtime));
        }

        let data = self.backend.read(&norm).await.unwrap_or_default();
        self.backend.write_with_metadata(&norm, data, meta).await?;

        self.caches.invalidate(path);
        if let Some(entity) = self.caches.fd.get(path) {
            if let Some(mtime) = mtime_override {
                entity.set_mtime(mtime);
            }
        }
        Ok(())
    }

    pub async fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        let attr = self.get_attr(path).await?;
        let is_dir = attr.mode & S_IFMT == S_IFDIR;
        let file_type = attr.mode & S_IFMT;
        let perm = mode & 0o7777;
        let now = SystemTime::now();
        self.mutate_object_metadata(path, Some(now), move |meta| {
            let stored_mode = if is_dir { perm } else { file_type | perm };
            meta.insert("mode".to_string(), metadata::encode_mode(stored_mode));
        })
        .await
    }

    pub async fn chown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        let now = SystemTime::now();
        self.mutate_object_metadata(path, Some(now), move |meta| {
            if let Some(uid) = uid {
                meta.insert("uid".to_string(), metadata::encode_id(uid));
            }
            if let Some(gid) = gid {
                meta.insert("gid".to_string(), metadata::encode_id(gid));
            }
        })
        .await
    }

    pub async fn utimens(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> Result<()> {
        self.mutate_object_metadata(path, Some(mtime), move |meta| {
            meta.insert("atime".to_string(), metadata::encode_time(atime));
        })
        .await
    }

    pub async fn set_xattr(&self, path: &str, name: &str, value: &[u8]) -> Result<()> {
        let key = metadata::xattr_key(name);
        let encoded = metadata::encode_xattr_value(value);
        self.mutate_object_metadata(path, None, move |meta| {
            meta.insert(key, encoded);
        })
        .await
    }

    pub async fn remove_xattr(&self, path: &str, name: &str) -> Result<()> {
        let key = metadata::xattr_key(name);
        self.mutate_object_metadata(path, None, move |meta| {
            meta.remove(&key);
        })
        .await
    }

    pub async fn get_xattr(&self, path: &str, name: &str) -> Result<Vec<u8>> {
        let target = self.marker_or_self(path).await?;
        let meta = self.backend.get_metadata(&path::normalize(&target)).await?;
        meta.get(&metadata::xattr_key(name))
            .map(|v| metadata::decode_xattr_value(v))
            .ok_or(crate::error::Error::NotFound)
    }

    pub async fn list_xattr(&self, path: &str) -> Result<Vec<String>> {
        let target = self.marker_or_self(path).await?;
        let meta = self.backend.get_metadata(&path::normalize(&target)).await.unwrap_or_default();
        Ok(metadata::list_xattrs(&meta))
    }
}
