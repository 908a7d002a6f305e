//! Per-path cached file state: the page cache, dirty tracking, and the
//! optional local scratch file backing a file larger than the page cache
//! wants to hold in memory.
//!
//! State that can be mutated without crossing an `.await` lives behind a
//! plain [`std::sync::Mutex`] (`Inner`) so it is never held across an await
//! point. An entity that opts into file locking additionally serializes
//! whole read/write/flush/fsync calls behind `advisory`, a
//! [`tokio::sync::RwLock`] held for the call's full duration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::{Instant, SystemTime};

use tokio::sync::RwLock as AsyncRwLock;

use super::page::{align_down, Page};

/// Default number of pages an entity holds before evicting.
pub const DEFAULT_PAGE_CAP: usize = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

struct Inner {
    size: u64,
    mtime: SystemTime,
    pages: HashMap<u64, Page>,
    bytes_modified: i64,
    scratch_file: Option<PathBuf>,
    last_access: Instant,
    last_write: Instant,
}

impl Inner {
    fn dirty_len(&self) -> i64 {
        self.pages.values().filter(|p| p.dirty).map(|p| p.data.len() as i64).sum()
    }
}

/// Cached state for one open path. Shared via `Arc` across every file handle
/// open on the same path; refcounted by the owning cache manager.
pub struct FdEntity {
    path: String,
    page_size: u64,
    page_cap: usize,
    inner: Mutex<Inner>,
    refcount: AtomicI64,
    pub advisory: AsyncRwLock<()>,
}

impl FdEntity {
    pub fn new(path: impl Into<String>, size: u64, mtime: SystemTime) -> Self {
        Self::with_page_params(path, size, mtime, DEFAULT_PAGE_SIZE, DEFAULT_PAGE_CAP)
    }

    pub fn with_page_params(
        path: impl Into<String>,
        size: u64,
        mtime: SystemTime,
        page_size: u64,
        page_cap: usize,
    ) -> Self {
        Self {
            path: path.into(),
            page_size,
            page_cap,
            inner: Mutex::new(Inner {
                size,
                mtime,
                pages: HashMap::new(),
                bytes_modified: 0,
                scratch_file: None,
                last_access: Instant::now(),
                last_write: Instant::now(),
            }),
            refcount: AtomicI64::new(0),
            advisory: AsyncRwLock::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn incref(&self) -> i64 {
        self.refcount.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn decref(&self) -> i64 {
        self.refcount.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn refcount(&self) -> i64 {
        self.refcount.load(Ordering::SeqCst)
    }

    pub fn last_access(&self) -> Instant {
        self.inner.lock().expect("lock poisoned").last_access
    }

    pub fn touch(&self) {
        self.inner.lock().expect("lock poisoned").last_access = Instant::now();
    }

    /// How long ago this entity was last written to, for the `GetAttr`
    /// freshness-window heuristic.
    pub fn since_last_write(&self) -> std::time::Duration {
        self.inner.lock().expect("lock poisoned").last_write.elapsed()
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").size
    }

    pub fn set_size(&self, size: u64) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.size = size;
        inner.pages.retain(|&offset, page| {
            if offset >= size {
                return false;
            }
            let keep = (size - offset).min(page.data.len() as u64) as usize;
            page.data.truncate(keep);
            true
        });
    }

    pub fn mtime(&self) -> SystemTime {
        self.inner.lock().expect("lock poisoned").mtime
    }

    pub fn set_mtime(&self, mtime: SystemTime) {
        self.inner.lock().expect("lock poisoned").mtime = mtime;
    }

    pub fn bytes_modified(&self) -> i64 {
        self.inner.lock().expect("lock poisoned").bytes_modified
    }

    pub fn has_scratch_file(&self) -> bool {
        self.inner.lock().expect("lock poisoned").scratch_file.is_some()
    }

    /// Record that `path` (already populated with this entity's current
    /// contents) is now the backing scratch file, freeing cached pages.
    pub fn set_scratch_file(&self, path: PathBuf) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.scratch_file = Some(path);
        inner.pages.clear();
    }

    /// Write `data` at `offset`, merging into the page(s) it touches.
    /// `bytes_modified` is recomputed from every currently dirty page after
    /// the write rather than tracked incrementally, so a page that toggles
    /// dirty -> clean -> dirty never double-counts.
    pub fn write_page(&self, offset: u64, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().expect("lock poisoned");
        let page_size = self.page_size;
        let mut pos = 0usize;
        while pos < data.len() {
            let abs = offset + pos as u64;
            let page_offset = align_down(abs, page_size);
            let in_page = (abs - page_offset) as usize;
            let room = (page_size as usize) - in_page;
            let take = room.min(data.len() - pos);

            let page = inner.pages.entry(page_offset).or_insert_with(|| Page::new(page_offset));
            let needed = in_page + take;
            if page.data.len() < needed {
                page.data.resize(needed, 0);
            }
            page.data[in_page..in_page + take].copy_from_slice(&data[pos..pos + take]);
            page.dirty = true;
            page.touch();

            pos += take;
        }

        let new_end = offset + data.len() as u64;
        if new_end > inner.size {
            inner.size = new_end;
        }
        inner.bytes_modified = inner.dirty_len();
        inner.last_access = Instant::now();
        inner.last_write = Instant::now();
        Self::evict_if_needed(&mut inner, self.page_cap);
    }

    /// Evict cached pages down to `cap`, preferring clean pages. A dirty
    /// page is only evicted when every cached page is dirty, so buffered
    /// writes below `max_dirty_data` are never silently dropped just
    /// because the page cap (far smaller by default) was exceeded.
    fn evict_if_needed(inner: &mut Inner, cap: usize) {
        while inner.pages.len() > cap {
            let victim = inner
                .pages
                .values()
                .filter(|p| !p.dirty)
                .min_by_key(|p| p.last_access)
                .map(|p| p.offset)
                .or_else(|| inner.pages.values().min_by_key(|p| p.last_access).map(|p| p.offset));
            match victim {
                Some(offset) => {
                    inner.pages.remove(&offset);
                }
                None => break,
            }
        }
    }

    /// Mark every page clean and zero `bytes_modified`. Called after a
    /// successful upload.
    pub fn mark_clean(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        for page in inner.pages.values_mut() {
            page.dirty = false;
        }
        inner.bytes_modified = 0;
    }

    /// Build the full byte buffer this entity currently represents: scratch
    /// file contents (if any) or zero-fill, overlaid with dirty pages and
    /// clipped to the current size. Returns `(bytes, scratch path used)`.
    pub async fn snapshot(&self) -> (Vec<u8>, Option<PathBuf>) {
        let (size, scratch, pages) = {
            let inner = self.inner.lock().expect("lock poisoned");
            let pages: Vec<Page> = inner.pages.values().cloned().collect();
            (inner.size, inner.scratch_file.clone(), pages)
        };

        let mut buf = vec![0u8; size as usize];
        if let Some(scratch) = &scratch {
            if let Ok(contents) = tokio::fs::read(scratch).await {
                let take = contents.len().min(buf.len());
                buf[..take].copy_from_slice(&contents[..take]);
            }
        }
        for page in &pages {
            let start = page.offset as usize;
            if start >= buf.len() {
                continue;
            }
            let end = (start + page.data.len()).min(buf.len());
            buf[start..end].copy_from_slice(&page.data[..end - start]);
        }
        (buf, scratch)
    }

    /// Attempt a page-cache hit for `[offset, offset + len)` without
    /// touching the backend: `None` unless every byte in the range is
    /// already held by a cached page, contiguous and fully populated.
    pub fn read_page(&self, offset: u64, len: u64) -> Option<Vec<u8>> {
        let inner = self.inner.lock().expect("lock poisoned");
        let end = (offset + len).min(inner.size);
        if end <= offset {
            return Some(Vec::new());
        }

        let mut buf = Vec::with_capacity((end - offset) as usize);
        let mut pos = offset;
        while pos < end {
            let page_offset = align_down(pos, self.page_size);
            let page = inner.pages.get(&page_offset)?;
            let in_page = (pos - page_offset) as usize;
            if in_page >= page.data.len() {
                return None;
            }
            let avail = page.data.len() - in_page;
            let want = (end - pos) as usize;
            let take = avail.min(want);
            buf.extend_from_slice(&page.data[in_page..in_page + take]);
            pos += take as u64;
        }
        Some(buf)
    }

    /// Read `len` bytes at `offset` from the buffered view of this entity.
    /// Returns an empty vec past the current size.
    pub async fn read_buffered(&self, offset: u64, len: u64) -> Vec<u8> {
        let (buf, _) = self.snapshot().await;
        let start = offset.min(buf.len() as u64) as usize;
        let end = (offset + len).min(buf.len() as u64) as usize;
        buf[start..end.max(start)].to_vec()
    }

    /// Snapshot the current buffered contents, call `upload_fn` with them,
    /// and on success clear dirty state. On failure, dirty state is left
    /// untouched so a later retry can still find the buffered bytes.
    pub async fn upload_buffered<F, Fut>(&self, upload_fn: F) -> Result<(), crate::backend::BackendError>
    where
        F: FnOnce(Vec<u8>) -> Fut,
        Fut: std::future::Future<Output = Result<(), crate::backend::BackendError>>,
    {
        let (buf, _) = self.snapshot().await;
        upload_fn(buf).await?;
        self.mark_clean();
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().expect("lock poisoned").bytes_modified > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn entity() -> FdEntity {
        FdEntity::with_page_params("/a", 0, SystemTime::now(), 16, 2)
    }

    #[test]
    fn write_marks_dirty_and_updates_size() {
        let e = entity();
        e.write_page(0, b"hello");
        assert_eq!(e.size(), 5);
        assert!(e.is_dirty());
        assert_eq!(e.bytes_modified(), 5);
    }

    #[test]
    fn write_spanning_pages_splits_correctly() {
        let e = entity();
        e.write_page(10, b"0123456789");
        assert_eq!(e.size(), 20);
        assert_eq!(e.bytes_modified(), 10);
    }

    #[tokio::test]
    async fn read_buffered_returns_written_bytes() {
        let e = entity();
        e.write_page(0, b"hello world");
        assert_eq!(e.read_buffered(6, 5).await, b"world");
    }

    #[tokio::test]
    async fn read_buffered_past_size_is_empty() {
        let e = entity();
        e.write_page(0, b"hi");
        assert_eq!(e.read_buffered(100, 10).await, Vec::<u8>::new());
    }

    #[test]
    fn mark_clean_zeroes_bytes_modified() {
        let e = entity();
        e.write_page(0, b"hello");
        e.mark_clean();
        assert_eq!(e.bytes_modified(), 0);
        assert!(!e.is_dirty());
    }

    #[test]
    fn eviction_prefers_clean_pages_over_dirty() {
        let e = entity();
        // page cap is 2, page size 16: write three distinct pages, the
        // first clean (via mark_clean), the rest dirty.
        e.write_page(0, b"a");
        e.mark_clean();
        e.write_page(16, b"b");
        e.write_page(32, b"c");
        // the clean page at offset 0 should have been evicted, not the
        // dirty ones.
        assert_eq!(e.bytes_modified(), 2);
    }

    #[test]
    fn read_page_hits_when_range_is_fully_cached() {
        let e = entity();
        e.write_page(0, b"hello world");
        assert_eq!(e.read_page(6, 5), Some(b"world".to_vec()));
    }

    #[test]
    fn read_page_spans_multiple_cached_pages() {
        // page size is 16 and cap is 2: two 16-byte-aligned pages, no eviction.
        let e = entity();
        e.write_page(0, b"01234567890123456789");
        assert_eq!(e.read_page(10, 10), Some(b"0123456789".to_vec()));
    }

    #[test]
    fn read_page_misses_when_not_cached() {
        let e = entity();
        assert_eq!(e.read_page(0, 5), None);
    }

    #[test]
    fn read_page_past_size_returns_empty_without_backend() {
        let e = entity();
        e.write_page(0, b"hi");
        assert_eq!(e.read_page(100, 10), Some(Vec::new()));
    }

    #[test]
    fn refcount_tracks_open_handles() {
        let e = entity();
        assert_eq!(e.incref(), 1);
        assert_eq!(e.incref(), 2);
        assert_eq!(e.decref(), 1);
        assert_eq!(e.refcount(), 1);
    }

    #[tokio::test]
    async fn upload_buffered_clears_dirty_state_on_success() {
        let e = entity();
        e.write_page(0, b"payload");
        let result = e
            .upload_buffered(|buf| async move {
                assert_eq!(buf, b"payload");
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert!(!e.is_dirty());
    }

    #[tokio::test]
    async fn upload_buffered_preserves_dirty_state_on_failure() {
        let e = entity();
        e.write_page(0, b"payload");
        let result = e
            .upload_buffered(|_| async move { Err(crate::backend::BackendError::Transient) })
            .await;
        assert!(result.is_err());
        assert!(e.is_dirty());
    }
}
