//! In-memory disk manager.
//!
//! Backs the buffer pool with a hash map instead of a file. Used by unit
//! and integration tests; the operation counters let tests observe the
//! pool's I/O behavior (e.g. that a delete issued exactly one write-back).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use corten_common::types::PageId;
use parking_lot::RwLock;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager that keeps all pages in memory.
pub struct MemDiskManager {
    pages: RwLock<HashMap<PageId, Vec<u8>>>,
    page_size: usize,
    reads: AtomicU64,
    writes: AtomicU64,
    allocates: AtomicU64,
    deallocates: AtomicU64,
}

impl MemDiskManager {
    /// Creates an empty in-memory disk with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            page_size,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            allocates: AtomicU64::new(0),
            deallocates: AtomicU64::new(0),
        }
    }

    /// Returns the page size all I/O uses.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns true if `page_id` has been written.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.read().contains_key(&page_id)
    }

    /// Number of `read_page` calls so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write_page` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of `allocate_page` calls so far.
    pub fn allocate_count(&self) -> u64 {
        self.allocates.load(Ordering::Relaxed)
    }

    /// Number of `deallocate_page` calls so far.
    pub fn deallocate_count(&self) -> u64 {
        self.deallocates.load(Ordering::Relaxed)
    }

    fn check_len(&self, len: usize) -> DiskResult<()> {
        if len != self.page_size {
            return Err(DiskError::PageSizeMismatch {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }
}

impl DiskManager for MemDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        self.check_len(buf.len())?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        match self.pages.read().get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        self.check_len(data.len())?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.pages.write().insert(page_id, data.to_vec());
        Ok(())
    }

    fn allocate_page(&self, _page_id: PageId) -> DiskResult<()> {
        self.allocates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        self.deallocates.fetch_add(1, Ordering::Relaxed);
        self.pages.write().remove(&page_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_your_writes() {
        let disk = MemDiskManager::new(16);
        disk.write_page(PageId::new(1), &[9u8; 16]).unwrap();

        let mut buf = [0u8; 16];
        disk.read_page(PageId::new(1), &mut buf).unwrap();
        assert_eq!(buf, [9u8; 16]);
    }

    #[test]
    fn test_missing_page_reads_zeroes() {
        let disk = MemDiskManager::new(16);
        let mut buf = [0xffu8; 16];
        disk.read_page(PageId::new(42), &mut buf).unwrap();
        assert_eq!(buf, [0u8; 16]);
    }

    #[test]
    fn test_deallocate_drops_page() {
        let disk = MemDiskManager::new(16);
        disk.write_page(PageId::new(1), &[9u8; 16]).unwrap();
        disk.deallocate_page(PageId::new(1)).unwrap();
        assert!(!disk.contains(PageId::new(1)));
        assert_eq!(disk.deallocate_count(), 1);
    }

    #[test]
    fn test_counters() {
        let disk = MemDiskManager::new(16);
        let mut buf = [0u8; 16];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        disk.write_page(PageId::new(0), &buf).unwrap();
        disk.allocate_page(PageId::new(0)).unwrap();

        assert_eq!(disk.read_count(), 1);
        assert_eq!(disk.write_count(), 1);
        assert_eq!(disk.allocate_count(), 1);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let disk = MemDiskManager::new(16);
        let err = disk.write_page(PageId::new(0), &[0u8; 8]).unwrap_err();
        assert!(matches!(err, DiskError::PageSizeMismatch { .. }));
    }
}
