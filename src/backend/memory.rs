//! In-memory [`Backend`] used by the test suite and the `demofs` binary.
//!
//! Mirrors a flat key→bytes store with no network, no eventual consistency,
//! and no multipart semantics: good enough to exercise every filesystem-core
//! code path, not a stand-in for the real S3 adapter's edge cases.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use async_trait::async_trait;

use super::{Attr, Backend, BackendError, Metadata};

struct Object {
    data: Vec<u8>,
    metadata: Metadata,
    mtime: SystemTime,
}

/// A flat, process-local object store.
#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, Object>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn attr_from_object(obj: &Object) -> Attr {
    let mode = obj
        .metadata
        .get("mode")
        .and_then(|s| u32::from_str_radix(s, 8).ok())
        .unwrap_or(0o100644);
    let uid = obj.metadata.get("uid").and_then(|s| s.parse().ok()).unwrap_or(0);
    let gid = obj.metadata.get("gid").and_then(|s| s.parse().ok()).unwrap_or(0);
    Attr { mode, size: obj.data.len() as i64, mtime: obj.mtime, uid, gid }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let objects = self.objects.read().expect("lock poisoned");
        objects.get(path).map(|o| o.data.clone()).ok_or(BackendError::NotFound)
    }

    async fn read_range(
        &self,
        path: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<Vec<u8>, BackendError> {
        let objects = self.objects.read().expect("lock poisoned");
        let obj = objects.get(path).ok_or(BackendError::NotFound)?;
        if start == 0 && end_inclusive == 0 {
            return Ok(obj.data.clone());
        }
        let start = start as usize;
        let end = if end_inclusive == 0 {
            obj.data.len()
        } else {
            (end_inclusive as usize).saturating_add(1).min(obj.data.len())
        };
        if start >= obj.data.len() {
            return Ok(Vec::new());
        }
        Ok(obj.data[start..end.max(start)].to_vec())
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError> {
        self.write_with_metadata(path, data, Metadata::new()).await
    }

    async fn write_with_metadata(
        &self,
        path: &str,
        data: Vec<u8>,
        metadata: Metadata,
    ) -> Result<(), BackendError> {
        let mut objects = self.objects.write().expect("lock poisoned");
        objects.insert(path.to_string(), Object { data, metadata, mtime: SystemTime::now() });
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let mut objects = self.objects.write().expect("lock poisoned");
        objects.remove(path).map(|_| ()).ok_or(BackendError::NotFound)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let objects = self.objects.read().expect("lock poisoned");
        Ok(objects.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
    }

    async fn get_attr(&self, path: &str) -> Result<Attr, BackendError> {
        let objects = self.objects.read().expect("lock poisoned");
        objects.get(path).map(attr_from_object).ok_or(BackendError::NotFound)
    }

    async fn get_metadata(&self, path: &str) -> Result<Metadata, BackendError> {
        let objects = self.objects.read().expect("lock poisoned");
        objects.get(path).map(|o| o.metadata.clone()).ok_or(BackendError::NotFound)
    }

    async fn rename(&self, old: &str, new: &str) -> Result<(), BackendError> {
        let mut objects = self.objects.write().expect("lock poisoned");
        let obj = objects.remove(old).ok_or(BackendError::NotFound)?;
        objects.insert(new.to_string(), obj);
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        let objects = self.objects.read().expect("lock poisoned");
        objects.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let backend = MemoryBackend::new();
        backend.write("a.txt", b"hello".to_vec()).await.unwrap();
        assert_eq!(backend.read("a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn read_range_clips_to_object_length() {
        let backend = MemoryBackend::new();
        backend.write("a.txt", b"hello world".to_vec()).await.unwrap();
        let got = backend.read_range("a.txt", 6, 100).await.unwrap();
        assert_eq!(got, b"world");
    }

    #[tokio::test]
    async fn read_range_with_zero_end_reads_to_eof_from_nonzero_start() {
        let backend = MemoryBackend::new();
        backend.write("a.txt", b"abcdef".to_vec()).await.unwrap();
        let got = backend.read_range("a.txt", 2, 0).await.unwrap();
        assert_eq!(got, b"cdef");
    }

    #[tokio::test]
    async fn rename_moves_bytes_and_metadata() {
        let backend = MemoryBackend::new();
        let mut meta = Metadata::new();
        meta.insert("mode".to_string(), "644".to_string());
        backend.write_with_metadata("a", b"x".to_vec(), meta).await.unwrap();
        backend.rename("a", "b").await.unwrap();
        assert_eq!(backend.read("b").await.unwrap(), b"x");
        assert!(matches!(backend.read("a").await, Err(BackendError::NotFound)));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let backend = MemoryBackend::new();
        backend.write("dir/a", vec![]).await.unwrap();
        backend.write("dir/b", vec![]).await.unwrap();
        backend.write("other/c", vec![]).await.unwrap();
        let mut keys = backend.list("dir/").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["dir/a".to_string(), "dir/b".to_string()]);
    }
}
