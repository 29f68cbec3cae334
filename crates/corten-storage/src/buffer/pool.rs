//! Buffer pool manager: page table, frame allocation, and page lifecycle.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use corten_common::types::PageId;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{Frame, FrameId};
use super::latch::{PageGuard, ReadPageGuard, WritePageGuard};
use super::replacer::{AccessType, LruKReplacer};
use super::BufferPoolStats;
use crate::disk::DiskManager;

/// State protected by the pool's structural latch.
///
/// Every frame is either in the free list or holds a resident page that
/// appears in the page table; `free_list.len() + page_table.len()` always
/// equals the pool size.
struct PoolState {
    /// Maps resident `PageId` to the `FrameId` holding it.
    page_table: HashMap<PageId, FrameId>,
    /// Empty frames, popped from the head and pushed at the tail.
    free_list: VecDeque<FrameId>,
    /// Monotonic page id allocator; ids are never reused.
    next_page_id: u32,
}

/// The buffer pool caches fixed-size disk pages in a fixed set of frames.
///
/// Pages are fetched from a [`DiskManager`] on demand and pinned while in
/// use; unpinned frames are eviction candidates ranked by the LRU-K
/// replacer. Frames write back their bytes before reuse when dirty.
///
/// # Latch hierarchy
///
/// To prevent deadlocks, latches are acquired top-down:
/// 1. the structural latch (`state`), protecting the page table, free
///    list, and page id allocator;
/// 2. the replacer's internal latch (only taken under the structural
///    latch);
/// 3. per-frame reader-writer latches on the page bytes.
///
/// Frame metadata (page id, pin count, dirty flag) is mutated only under
/// the structural latch. Per-frame latches are taken only after the frame
/// is pinned and are never held while waiting for the structural latch.
///
/// # Thread safety
///
/// All operations are safe to call concurrently via `Arc<BufferPool>`.
pub struct BufferPool {
    /// Configuration (immutable after construction).
    config: BufferPoolConfig,
    /// Frame array; the Vec itself never changes after construction.
    frames: Vec<Arc<Frame>>,
    /// Structural latch.
    state: Mutex<PoolState>,
    /// LRU-K replacer; invoked only while the structural latch is held.
    replacer: LruKReplacer,
    /// The disk provider.
    disk: Arc<dyn DiskManager>,
    fetch_count: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: AtomicU64,
    flush_count: AtomicU64,
}

impl BufferPool {
    /// Creates a new buffer pool over the given disk provider.
    pub fn new(disk: Arc<dyn DiskManager>, config: BufferPoolConfig) -> BufferResult<Self> {
        config.validate().map_err(BufferError::config)?;

        let pool_size = config.pool_size;
        let frames: Vec<Arc<Frame>> = (0..pool_size)
            .map(|i| Arc::new(Frame::new(FrameId::new(i), config.page_size)))
            .collect();
        let free_list: VecDeque<FrameId> = (0..pool_size).map(FrameId::new).collect();
        let replacer = LruKReplacer::new(pool_size, config.replacer_k);

        Ok(Self {
            config,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                next_page_id: 0,
            }),
            replacer,
            disk,
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Returns the buffer pool configuration.
    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Allocates a fresh page id and installs the page in a frame.
    ///
    /// The frame is zeroed, clean, and pinned once. Fails with
    /// [`BufferError::NoFreeFrames`] iff no frame is free and no frame is
    /// evictable.
    pub fn new_page(&self) -> BufferResult<(PageId, Arc<Frame>)> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        if let Err(e) = self.disk.allocate_page(page_id) {
            // The id is burned but the frame goes back to the free list.
            state.free_list.push_back(frame_id);
            return Err(e.into());
        }

        let frame = Arc::clone(&self.frames[frame_id.index()]);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, AccessType::Unknown);
        self.replacer.set_evictable(frame_id, false);

        trace!(page = %page_id, frame = frame_id.index(), "allocated new page");
        Ok((page_id, frame))
    }

    /// Fetches a page, reading it from disk on a miss.
    ///
    /// The returned frame is pinned once per successful call; the caller
    /// owes a matching [`BufferPool::unpin_page`]. Fails with
    /// [`BufferError::NoFreeFrames`] iff no frame can be obtained.
    pub fn fetch_page(&self, page_id: PageId, access: AccessType) -> BufferResult<Arc<Frame>> {
        assert!(page_id.is_valid(), "cannot fetch the invalid page id");
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = Arc::clone(&self.frames[frame_id.index()]);
            frame.pin();
            self.replacer.record_access(frame_id, access);
            self.replacer.set_evictable(frame_id, false);
            return Ok(frame);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = Arc::clone(&self.frames[frame_id.index()]);

        // Install before the read so the in-flight frame is already pinned
        // and resident with respect to the page table.
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        state.page_table.insert(page_id, frame_id);

        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk.read_page(page_id, &mut data) {
                // Undo the installation; the frame returns to the free
                // list and the error surfaces unchanged.
                drop(data);
                state.page_table.remove(&page_id);
                frame.reset();
                frame.reset_memory();
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
        }

        self.replacer.record_access(frame_id, access);
        self.replacer.set_evictable(frame_id, false);

        trace!(page = %page_id, frame = frame_id.index(), "page read into frame");
        Ok(frame)
    }

    /// Drops one pin on a resident page.
    ///
    /// `is_dirty` is OR'd into the frame's dirty flag: a writer's `true`
    /// is sticky and a reader's `false` never clears an earlier mark. When
    /// the pin count reaches zero the frame becomes evictable.
    ///
    /// Returns false if the page is not resident or was not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool, _access: AccessType) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() == 0 {
            return false;
        }

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a resident page's bytes to disk, regardless of the dirty
    /// flag, and clears the flag on success.
    ///
    /// Pin count and evictability are unchanged. Returns `Ok(false)` if
    /// the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.index()];

        {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
        }
        frame.set_dirty(false);
        self.flush_count.fetch_add(1, Ordering::Relaxed);

        debug!(page = %page_id, "flushed page");
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> BufferResult<()> {
        let state = self.state.lock();
        for (&page_id, &frame_id) in &state.page_table {
            let frame = &self.frames[frame_id.index()];
            {
                let data = frame.read_data();
                self.disk.write_page(page_id, &data)?;
            }
            frame.set_dirty(false);
            self.flush_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Deletes a page from the pool.
    ///
    /// A page that is not resident deletes trivially (`Ok(true)`). A
    /// pinned page cannot be deleted (`Ok(false)`). Otherwise the page is
    /// written back if dirty, its frame is reset and returned to the free
    /// list, and the provider's deallocate hook runs.
    pub fn delete_page(&self, page_id: PageId) -> BufferResult<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.index()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data)?;
            drop(data);
            frame.set_dirty(false);
        }

        frame.reset_memory();
        frame.reset();
        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        state.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id)?;

        debug!(page = %page_id, "deleted page");
        Ok(true)
    }

    /// Fetches a page wrapped in a basic guard (pin only).
    pub fn fetch_page_basic(&self, page_id: PageId) -> BufferResult<PageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(PageGuard::new(self, frame, page_id))
    }

    /// Fetches a page wrapped in a guard holding the frame's reader latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> BufferResult<ReadPageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        // The latch is taken after the structural latch is released; the
        // pin keeps the frame resident in between.
        Ok(ReadPageGuard::new(self, frame, page_id))
    }

    /// Fetches a page wrapped in a guard holding the frame's writer latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> BufferResult<WritePageGuard<'_>> {
        let frame = self.fetch_page(page_id, AccessType::Unknown)?;
        Ok(WritePageGuard::new(self, frame, page_id))
    }

    /// Allocates a new page wrapped in a basic guard.
    pub fn new_page_guarded(&self) -> BufferResult<PageGuard<'_>> {
        let (page_id, frame) = self.new_page()?;
        Ok(PageGuard::new(self, frame, page_id))
    }

    /// Returns true if `page_id` is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Returns the pin count of a resident page.
    pub fn pin_count_of(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(self.frames[frame_id.index()].pin_count())
    }

    /// Returns the dirty flag of a resident page.
    pub fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.lock();
        let &frame_id = state.page_table.get(&page_id)?;
        Some(self.frames[frame_id.index()].is_dirty())
    }

    /// Returns the number of empty frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns the number of resident pages.
    pub fn resident_page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Returns the number of frames the replacer could evict right now.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    /// Obtains an empty frame: the free list's head, else an evicted
    /// victim with its old page written back when dirty.
    fn acquire_frame(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let victim = self.replacer.evict().ok_or(BufferError::NoFreeFrames)?;
        let frame = &self.frames[victim.index()];
        let old_page_id = frame.page_id();
        debug_assert!(old_page_id.is_valid(), "victim frame holds no page");
        debug_assert_eq!(frame.pin_count(), 0, "victim frame is pinned");

        if frame.is_dirty() {
            let data = frame.read_data();
            if let Err(e) = self.disk.write_page(old_page_id, &data) {
                // Re-admit the victim; its page stays resident and dirty.
                drop(data);
                self.replacer.record_access(victim, AccessType::Unknown);
                self.replacer.set_evictable(victim, true);
                return Err(e.into());
            }
            frame.set_dirty(false);
        }

        trace!(page = %old_page_id, frame = victim.index(), "evicted page");
        state.page_table.remove(&old_page_id);
        frame.reset_memory();
        frame.reset();
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        Ok(victim)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("pool_size", &self.config.pool_size)
            .field("page_size", &self.config.page_size)
            .field("replacer_k", &self.config.replacer_k)
            .field("resident_pages", &self.resident_page_count())
            .finish()
    }
}
