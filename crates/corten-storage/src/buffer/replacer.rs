//! LRU-K replacement policy for the buffer pool.
//!
//! LRU-K orders eviction candidates by backward k-distance: the distance
//! from now to a frame's k-th most recent access, or infinity for frames
//! seen fewer than k times. Evicting the frame with the largest distance
//! keeps pages with an established re-reference history resident while a
//! one-pass scan cannot flush them out.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// Hint describing why a page access happened.
///
/// Accepted by the replacer alongside every access. The current policy
/// records the access without biasing the timestamp, so the hint does not
/// change eviction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Unclassified access.
    #[default]
    Unknown,
    /// Point lookup.
    Get,
    /// Sequential scan.
    Scan,
    /// Index traversal.
    Index,
}

/// Per-frame bookkeeping for the LRU-K policy.
#[derive(Debug, Default)]
struct LruKNode {
    /// Timestamps of the most recent accesses, newest first, at most k.
    history: VecDeque<u64>,
    /// Whether the frame is a candidate for eviction.
    is_evictable: bool,
}

struct ReplacerState {
    /// Bookkeeping for every frame seen so far, keyed by frame id.
    nodes: HashMap<FrameId, LruKNode>,
    /// Logical clock; incremented on every recorded access.
    current_timestamp: u64,
    /// Number of nodes with `is_evictable` set.
    curr_size: usize,
}

/// LRU-K replacer over the buffer pool's frames.
///
/// Thread-safe: a single internal latch protects all state. Every
/// operation is short and never performs I/O.
pub struct LruKReplacer {
    state: Mutex<ReplacerState>,
    /// Pool capacity; frame ids must be below this.
    replacer_size: usize,
    /// The K in LRU-K.
    k: usize,
}

impl LruKReplacer {
    /// Creates a replacer for `num_frames` frames with the given `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            state: Mutex::new(ReplacerState {
                nodes: HashMap::with_capacity(num_frames),
                current_timestamp: 0,
                curr_size: 0,
            }),
            replacer_size: num_frames,
            k,
        }
    }

    /// Returns the configured K.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Records an access to `frame_id`, creating its node on first sight.
    ///
    /// Timestamps come from a monotonically increasing logical clock, so
    /// distinct accesses are never reordered.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) {
        let mut state = self.state.lock();
        assert!(
            frame_id.index() < self.replacer_size,
            "frame id {} out of range for replacer of {} frames",
            frame_id.index(),
            self.replacer_size
        );

        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let node = state.nodes.entry(frame_id).or_default();
        node.history.push_front(timestamp);
        if node.history.len() > self.k {
            node.history.pop_back();
        }
    }

    /// Marks `frame_id` evictable or not. Idempotent.
    ///
    /// Called on every pin/unpin transition; `curr_size` tracks the number
    /// of evictable frames.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut state = self.state.lock();
        assert!(
            frame_id.index() < self.replacer_size,
            "frame id {} out of range for replacer of {} frames",
            frame_id.index(),
            self.replacer_size
        );

        let node = state.nodes.entry(frame_id).or_default();
        if node.is_evictable != evictable {
            node.is_evictable = evictable;
            if evictable {
                state.curr_size += 1;
            } else {
                debug_assert!(state.curr_size > 0);
                state.curr_size -= 1;
            }
        }
    }

    /// Evicts the frame with the largest backward k-distance.
    ///
    /// Frames with fewer than k accesses have infinite distance and are
    /// preferred, oldest first access winning among them; frames with a
    /// full history compare by their k-th most recent access. Ties break
    /// toward the smaller frame id. Returns `None` when nothing is
    /// evictable.
    ///
    /// The victim's history is cleared and it leaves the evictable set.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.curr_size == 0 {
            return None;
        }

        // The back of the history is the oldest retained access: the k-th
        // most recent for full histories, the first access otherwise.
        let mut victim: Option<(bool, u64, FrameId)> = None;
        for (&fid, node) in &state.nodes {
            if !node.is_evictable {
                continue;
            }
            let has_full_history = node.history.len() >= self.k;
            let oldest = node.history.back().copied().unwrap_or(0);
            let candidate = (has_full_history, oldest, fid);
            victim = match victim {
                Some(best) if best <= candidate => Some(best),
                _ => Some(candidate),
            };
        }

        let (_, _, fid) = victim.expect("curr_size > 0 but no evictable node");
        let node = state
            .nodes
            .get_mut(&fid)
            .expect("victim node missing from store");
        node.history.clear();
        node.is_evictable = false;
        state.curr_size -= 1;
        Some(fid)
    }

    /// Removes `frame_id` from the replacer, discarding its history.
    ///
    /// A frame never seen is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the frame is known but not evictable; removing a pinned
    /// frame is a caller bug.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let Some(node) = state.nodes.get_mut(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "remove called on non-evictable frame {}",
            frame_id.index()
        );
        node.history.clear();
        node.is_evictable = false;
        state.curr_size -= 1;
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruKReplacer")
            .field("replacer_size", &self.replacer_size)
            .field("k", &self.k)
            .field("curr_size", &state.curr_size)
            .finish()
    }
}
