//! Page guards: RAII handles that pin a page and optionally hold its latch.
//!
//! A guard owns exactly one pin on its frame. Dropping the guard releases
//! the frame latch (if any) and then unpins through the pool, so the
//! pin/latch pair can never leak on an early return. `release` is
//! idempotent; a released guard unpins nothing on drop.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use corten_common::types::PageId;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::frame::{Frame, FrameReadGuard, FrameWriteGuard};
use super::pool::BufferPool;
use super::replacer::AccessType;

/// Shared view of a frame's page bytes, held for the duration of a borrow.
struct PageDataRef<'a> {
    guard: RwLockReadGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Exclusive view of a frame's page bytes, held for the duration of a borrow.
struct PageDataMut<'a> {
    guard: RwLockWriteGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Basic page guard: holds a pin, takes the frame latch only per access.
///
/// `data`/`data_mut` acquire the frame's reader/writer latch for the
/// lifetime of the returned borrow. For a latch held across the whole
/// guard lifetime use [`ReadPageGuard`] or [`WritePageGuard`], or upgrade
/// with [`PageGuard::upgrade_read`] / [`PageGuard::upgrade_write`].
pub struct PageGuard<'a> {
    pool: &'a BufferPool,
    frame: Option<Arc<Frame>>,
    page_id: PageId,
    dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(super) fn new(pool: &'a BufferPool, frame: Arc<Frame>, page_id: PageId) -> Self {
        Self {
            pool,
            frame: Some(frame),
            page_id,
            dirty: false,
        }
    }

    fn frame(&self) -> &Arc<Frame> {
        self.frame.as_ref().expect("page guard already released")
    }

    /// Returns the guarded page's id.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Reads the page bytes under the frame's reader latch.
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame().read_data(),
        }
    }

    /// Writes the page bytes under the frame's writer latch.
    ///
    /// Marks the guard dirty; the flag reaches the frame on unpin.
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.dirty = true;
        PageDataMut {
            guard: self.frame().write_data(),
        }
    }

    /// Marks the page dirty without touching its bytes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns true if this guard will unpin with the dirty flag set.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Converts into a guard that holds the frame's reader latch.
    ///
    /// The pin transfers; a dirty mark made through this guard is carried
    /// along and still reaches the frame on unpin.
    pub fn upgrade_read(mut self) -> ReadPageGuard<'a> {
        let frame = self.frame.take().expect("page guard already released");
        let latch = frame.read_data_arc();
        ReadPageGuard {
            pool: self.pool,
            frame: Some(frame),
            latch: Some(latch),
            page_id: self.page_id,
            dirty: self.dirty,
        }
    }

    /// Converts into a guard that holds the frame's writer latch.
    pub fn upgrade_write(mut self) -> WritePageGuard<'a> {
        let frame = self.frame.take().expect("page guard already released");
        let latch = frame.write_data_arc();
        WritePageGuard {
            pool: self.pool,
            frame: Some(frame),
            latch: Some(latch),
            page_id: self.page_id,
            dirty: self.dirty,
        }
    }

    /// Unpins the page. Idempotent; also invoked on drop.
    pub fn release(&mut self) {
        if self.frame.take().is_some() {
            let dirty = std::mem::take(&mut self.dirty);
            self.pool
                .unpin_page(self.page_id, dirty, AccessType::Unknown);
        }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id)
            .field("dirty", &self.dirty)
            .field("released", &self.frame.is_none())
            .finish()
    }
}

/// Read guard: holds a pin and the frame's reader latch.
///
/// The latch is held from construction until release, so the page bytes
/// cannot change while the guard lives. Read guards never dirty a page.
pub struct ReadPageGuard<'a> {
    pool: &'a BufferPool,
    frame: Option<Arc<Frame>>,
    latch: Option<FrameReadGuard>,
    page_id: PageId,
    /// Carried over from an upgraded basic guard; never set here.
    dirty: bool,
}

impl<'a> ReadPageGuard<'a> {
    pub(super) fn new(pool: &'a BufferPool, frame: Arc<Frame>, page_id: PageId) -> Self {
        let latch = frame.read_data_arc();
        Self {
            pool,
            frame: Some(frame),
            latch: Some(latch),
            page_id,
            dirty: false,
        }
    }

    /// Returns the guarded page's id.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        self.latch.as_ref().expect("page guard already released")
    }

    /// Releases the latch, then unpins. Idempotent; also invoked on drop.
    pub fn release(&mut self) {
        // Latch before pin, mirroring acquisition in reverse.
        drop(self.latch.take());
        if self.frame.take().is_some() {
            let dirty = std::mem::take(&mut self.dirty);
            self.pool
                .unpin_page(self.page_id, dirty, AccessType::Unknown);
        }
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ReadPageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.page_id)
            .field("released", &self.frame.is_none())
            .finish()
    }
}

/// Write guard: holds a pin and the frame's writer latch.
///
/// Grants exclusive access to the page bytes for the guard's lifetime.
pub struct WritePageGuard<'a> {
    pool: &'a BufferPool,
    frame: Option<Arc<Frame>>,
    latch: Option<FrameWriteGuard>,
    page_id: PageId,
    dirty: bool,
}

impl<'a> WritePageGuard<'a> {
    pub(super) fn new(pool: &'a BufferPool, frame: Arc<Frame>, page_id: PageId) -> Self {
        let latch = frame.write_data_arc();
        Self {
            pool,
            frame: Some(frame),
            latch: Some(latch),
            page_id,
            dirty: false,
        }
    }

    /// Returns the guarded page's id.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        self.latch.as_ref().expect("page guard already released")
    }

    /// Returns the page bytes mutably and marks the guard dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        self.latch.as_mut().expect("page guard already released")
    }

    /// Marks the page dirty without touching its bytes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns true if this guard will unpin with the dirty flag set.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Releases the latch, then unpins. Idempotent; also invoked on drop.
    pub fn release(&mut self) {
        drop(self.latch.take());
        if self.frame.take().is_some() {
            let dirty = std::mem::take(&mut self.dirty);
            self.pool
                .unpin_page(self.page_id, dirty, AccessType::Unknown);
        }
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for WritePageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("page_id", &self.page_id)
            .field("dirty", &self.dirty)
            .field("released", &self.frame.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::config::BufferPoolConfig;
    use super::super::pool::BufferPool;
    use crate::disk::MemDiskManager;

    const PAGE: usize = 64;

    fn test_pool(frames: usize) -> BufferPool {
        let config = BufferPoolConfig::new(frames)
            .with_replacer_k(2)
            .with_page_size(PAGE);
        let disk = Arc::new(MemDiskManager::new(PAGE));
        BufferPool::new(disk, config).unwrap()
    }

    #[test]
    fn test_guard_unpins_on_drop() {
        let pool = test_pool(4);
        let page_id = {
            let guard = pool.new_page_guarded().unwrap();
            assert_eq!(pool.pin_count_of(guard.page_id()), Some(1));
            guard.page_id()
        };
        assert_eq!(pool.pin_count_of(page_id), Some(0));
    }

    #[test]
    fn test_release_is_idempotent() {
        let pool = test_pool(4);
        let mut guard = pool.new_page_guarded().unwrap();
        let page_id = guard.page_id();

        guard.release();
        assert_eq!(pool.pin_count_of(page_id), Some(0));
        guard.release(); // second release must not underflow the pin
        drop(guard);
        assert_eq!(pool.pin_count_of(page_id), Some(0));
    }

    #[test]
    fn test_write_guard_marks_dirty_on_write() {
        let pool = test_pool(4);
        let page_id = {
            // new_page_guarded returns a clean page
            let guard = pool.new_page_guarded().unwrap();
            guard.page_id()
        };
        assert!(!pool.is_dirty(page_id).unwrap());

        {
            let mut guard = pool.fetch_page_write(page_id).unwrap();
            guard.data_mut()[0] = 1;
        }
        assert!(pool.is_dirty(page_id).unwrap());
    }

    #[test]
    fn test_read_guard_never_dirties() {
        let pool = test_pool(4);
        let page_id = pool.new_page_guarded().unwrap().page_id();

        {
            let guard = pool.fetch_page_read(page_id).unwrap();
            assert_eq!(guard.data().len(), PAGE);
        }
        assert!(!pool.is_dirty(page_id).unwrap());
    }

    #[test]
    fn test_reader_unpin_does_not_clear_dirty() {
        let pool = test_pool(4);
        let page_id = pool.new_page_guarded().unwrap().page_id();

        let mut writer = pool.fetch_page_basic(page_id).unwrap();
        writer.data_mut()[0] = 9;
        let reader = pool.fetch_page_basic(page_id).unwrap();

        drop(writer); // unpins with dirty = true
        assert!(pool.is_dirty(page_id).unwrap());

        drop(reader); // clean unpin must not wipe the mark
        assert!(pool.is_dirty(page_id).unwrap());
    }

    #[test]
    fn test_basic_guard_upgrade_read() {
        let pool = test_pool(4);
        let page_id = {
            let mut guard = pool.new_page_guarded().unwrap();
            guard.data_mut()[0] = 5;
            guard.page_id()
        };

        let basic = pool.fetch_page_basic(page_id).unwrap();
        let read = basic.upgrade_read();
        assert_eq!(read.data()[0], 5);
        assert_eq!(pool.pin_count_of(page_id), Some(1)); // pin transferred, not doubled
        drop(read);
        assert_eq!(pool.pin_count_of(page_id), Some(0));
    }

    #[test]
    fn test_upgrade_write_carries_dirty_mark() {
        let pool = test_pool(4);
        let page_id = pool.new_page_guarded().unwrap().page_id();
        pool.flush_page(page_id).unwrap(); // start clean

        let mut basic = pool.fetch_page_basic(page_id).unwrap();
        basic.mark_dirty();
        let write = basic.upgrade_write();
        drop(write);
        assert!(pool.is_dirty(page_id).unwrap());
    }

    #[test]
    fn test_two_read_guards_share_the_latch() {
        let pool = test_pool(4);
        let page_id = pool.new_page_guarded().unwrap().page_id();

        let r1 = pool.fetch_page_read(page_id).unwrap();
        let r2 = pool.fetch_page_read(page_id).unwrap();
        assert_eq!(r1.data(), r2.data());
        assert_eq!(pool.pin_count_of(page_id), Some(2));
    }
}
