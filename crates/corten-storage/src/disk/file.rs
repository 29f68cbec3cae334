//! File-backed disk manager.
//!
//! Pages live at `page_id * page_size` offsets in a single data file.
//! Positional reads and writes avoid shared seek state, so a single handle
//! serves all threads.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use corten_common::types::PageId;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager over a single data file.
pub struct FileDiskManager {
    file: File,
    path: PathBuf,
    page_size: usize,
}

impl FileDiskManager {
    /// Opens (or creates) the data file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| DiskError::from_io_with_path(e, &path))?;

        Ok(Self {
            file,
            path,
            page_size,
        })
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size all I/O uses.
    pub fn page_size(&self) -> usize {
        self.page_size
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

    #[inline]
    fn offset(&self, page_id: PageId) -> u64 {
        u64::from(page_id.as_u32()) * self.page_size as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        self.check_len(buf.len())?;
        let offset = self.offset(page_id);

        // Reads past the current end of file zero-fill the tail: a page
        // that was allocated but never flushed reads back as all zeroes.
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DiskError::from_io_with_path(e, &self.path)),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        self.check_len(data.len())?;
        self.file
            .write_all_at(data, self.offset(page_id))
            .map_err(|e| DiskError::from_io_with_path(e, &self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: usize = 256;

    fn open_manager(dir: &tempfile::TempDir) -> FileDiskManager {
        FileDiskManager::open(dir.path().join("test.db"), PAGE).unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        let data = vec![7u8; PAGE];
        disk.write_page(PageId::new(3), &data).unwrap();

        let mut buf = vec![0u8; PAGE];
        disk.read_page(PageId::new(3), &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_unwritten_page_reads_zeroes() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        // Page 5 exists past the end of file; page 0 was never touched.
        disk.write_page(PageId::new(0), &vec![1u8; PAGE]).unwrap();

        let mut buf = vec![0xffu8; PAGE];
        disk.read_page(PageId::new(5), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_page_size_mismatch() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        let mut short = vec![0u8; PAGE / 2];
        let err = disk.read_page(PageId::new(0), &mut short).unwrap_err();
        assert!(matches!(err, DiskError::PageSizeMismatch { .. }));
    }

    #[test]
    fn test_pages_do_not_overlap() {
        let dir = tempdir().unwrap();
        let disk = open_manager(&dir);

        disk.write_page(PageId::new(0), &vec![0xaau8; PAGE]).unwrap();
        disk.write_page(PageId::new(1), &vec![0xbbu8; PAGE]).unwrap();

        let mut buf = vec![0u8; PAGE];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xaa));
        disk.read_page(PageId::new(1), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xbb));
    }
}
