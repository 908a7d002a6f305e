//! `Access` and `Statfs`.

use crate::backend::Backend;
use crate::error::Result;

use super::Filesystem;

/// Synthesized filesystem-level statistics (block size, counts, name
/// length limit). Constants are configurable via [`super::FsConfig`] so
/// tests can assert on them without coupling to a golden literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statfs {
    pub block_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub inodes: u64,
    pub inodes_free: u64,
    pub name_max: u32,
}

impl<B: Backend> Filesystem<B> {
    /// Succeeds iff `path` exists; permission bits are not independently
    /// enforced.
    pub async fn access(&self, path: &str) -> Result<()> {
        self.get_attr(path).await.map(|_| ())
    }

    pub fn statfs(&self) -> Statfs {
        Statfs {
            block_size: self.config.statfs_block_size,
            blocks: self.config.statfs_blocks,
            blocks_free: self.config.statfs_blocks,
            inodes: self.config.statfs_inodes,
            inodes_free: self.config.statfs_inodes,
            name_max: 255,
        }
    }
}
