//! Abstract object store capability the filesystem core consumes.
//!
//! Any implementation that answers these ten operations correctly can back
//! the filesystem; the provided [`s3`] adapter and the test-only [`memory`]
//! adapter are interchangeable from the core's point of view.

pub mod memory;
pub mod s3;

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;

/// User-metadata map carried alongside an object's bytes. Keys are the
/// semantic names (`mode`, `uid`, `gid`, `atime`, `mtime`, `ctime`,
/// `xattr-<name>`, ...); wire-level prefixing (`x-amz-meta-`) is entirely
/// the adapter's concern and never appears here.
pub type Metadata = HashMap<String, String>;

/// Attributes resolved from a backend object (size, mode, ownership, mtime).
#[derive(Debug, Clone, Copy)]
pub struct Attr {
    pub mode: u32,
    pub size: i64,
    pub mtime: SystemTime,
    pub uid: u32,
    pub gid: u32,
}

/// Backend failure classification. Only [`BackendError::Transient`] is
/// eligible for retry, and the backend is expected to have already retried
/// transient network failures before surfacing this; the filesystem core
/// itself never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("no such key")]
    NotFound,
    #[error("conflicting state")]
    Conflict,
    #[error("transient backend failure")]
    Transient,
    #[error("fatal backend failure")]
    Fatal,
}

/// Capability set the filesystem core requires from an object store.
///
/// Implementations must be safe for concurrent invocation from multiple
/// tasks; the filesystem core fans out concurrent operations on disjoint
/// paths freely and never serializes backend calls beyond what the entity
/// and advisory locks already guarantee.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Full-object GET.
    async fn read(&self, path: &str) -> Result<Vec<u8>, BackendError>;

    /// Ranged GET. `start == 0 && end_inclusive == 0` is equivalent to
    /// [`Backend::read`] (the whole object).
    async fn read_range(
        &self,
        path: &str,
        start: u64,
        end_inclusive: u64,
    ) -> Result<Vec<u8>, BackendError>;

    /// Whole-object PUT with no user-metadata.
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<(), BackendError>;

    /// Whole-object PUT carrying a user-metadata map.
    async fn write_with_metadata(
        &self,
        path: &str,
        data: Vec<u8>,
        metadata: Metadata,
    ) -> Result<(), BackendError>;

    /// Delete a single key.
    async fn delete(&self, path: &str) -> Result<(), BackendError>;

    /// All keys whose path starts with `prefix`; order is unspecified.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, BackendError>;

    /// Resolve size, mode, ownership and mtime for `path`.
    async fn get_attr(&self, path: &str) -> Result<Attr, BackendError>;

    /// Full user-metadata map for `path` (used for xattr enumeration).
    async fn get_metadata(&self, path: &str) -> Result<Metadata, BackendError>;

    /// Semantically a copy-then-delete preserving user-metadata. Large
    /// objects may use a multipart copy under the hood.
    async fn rename(&self, old: &str, new: &str) -> Result<(), BackendError>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> bool;
}
