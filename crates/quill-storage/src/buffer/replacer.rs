//! LRU-K replacement policy for the buffer pool.
//!
//! LRU-K chooses eviction victims by the K-th most recent access rather than
//! the most recent one. A frame accessed fewer than K times has no K-th
//! access yet; its backward distance is treated as infinite, so such frames
//! are always preferred as victims over frames with a full history. This
//! distinguishes genuinely hot pages from pages touched once by a scan.
//!
//! The replacer keeps a logical clock that advances on every recorded
//! access, and partitions known frames into two classes:
//!
//! - **cold**: fewer than K recorded accesses, ordered by most recent access
//! - **hot**: at least K recorded accesses, ordered by the oldest retained
//!   timestamp (the K-th most recent access)
//!
//! Victims are taken from the cold class first, oldest first; then from the
//! hot class by smallest K-th-most-recent timestamp. Only frames marked
//! evictable are candidates; pinned frames are registered but skipped.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// The kind of access being recorded.
///
/// The base policy treats all accesses alike; scan-resistant variants may
/// weigh them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Unclassified access.
    #[default]
    Unknown,
    /// Point lookup.
    Lookup,
    /// Sequential scan.
    Scan,
    /// Index traversal.
    Index,
}

/// Per-frame bookkeeping.
struct LruKNode {
    /// The last (up to) K access timestamps, oldest first.
    history: VecDeque<u64>,
    /// Whether this frame may be chosen as a victim.
    evictable: bool,
}

/// Replacer state behind the mutex.
struct ReplacerState {
    /// All frames known to the replacer.
    nodes: HashMap<FrameId, LruKNode>,
    /// Frames with fewer than K accesses, keyed by most recent access.
    cold: BTreeMap<u64, FrameId>,
    /// Frames with at least K accesses, keyed by oldest retained timestamp.
    hot: BTreeMap<u64, FrameId>,
    /// Number of frames currently marked evictable.
    evictable: usize,
    /// Logical clock; strictly increases on every recorded access, so the
    /// map keys above never collide.
    clock: u64,
}

/// LRU-K frame replacer.
///
/// All operations lock the replacer's own mutex for their full duration.
/// The buffer pool calls in with its manager mutex already held; the
/// nesting is always manager-then-replacer, so there is no deadlock path.
pub struct LruKReplacer {
    state: Mutex<ReplacerState>,
    num_frames: usize,
    k: usize,
}

impl LruKReplacer {
    /// Creates a replacer for frame IDs in `[0, num_frames)` with recency
    /// horizon `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            state: Mutex::new(ReplacerState {
                nodes: HashMap::new(),
                cold: BTreeMap::new(),
                hot: BTreeMap::new(),
                evictable: 0,
                clock: 0,
            }),
            num_frames,
            k,
        }
    }

    /// Records an access to `frame_id` at the next logical timestamp.
    ///
    /// An unknown frame is registered as non-evictable with a single-entry
    /// history. A known frame gets the new timestamp appended (dropping the
    /// oldest beyond K) and is re-ranked within its class; crossing the K-th
    /// access moves it from the cold class to the hot class.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside `[0, num_frames)`.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) {
        self.check_frame(frame_id);
        let state = &mut *self.state.lock();
        state.clock += 1;
        let ts = state.clock;
        let k = self.k;

        match state.nodes.entry(frame_id) {
            Entry::Vacant(entry) => {
                let mut history = VecDeque::with_capacity(k);
                history.push_back(ts);
                entry.insert(LruKNode {
                    history,
                    evictable: false,
                });
                if k == 1 {
                    state.hot.insert(ts, frame_id);
                } else {
                    state.cold.insert(ts, frame_id);
                }
            }
            Entry::Occupied(mut entry) => {
                let node = entry.get_mut();

                // Unrank under the old key before the history changes.
                let was_cold = node.history.len() < k;
                let old_key = if was_cold {
                    *node.history.back().expect("history is never empty")
                } else {
                    *node.history.front().expect("history is never empty")
                };

                node.history.push_back(ts);
                if node.history.len() > k {
                    node.history.pop_front();
                }

                let now_cold = node.history.len() < k;
                let new_key = if now_cold {
                    ts
                } else {
                    *node.history.front().expect("history is never empty")
                };

                if was_cold {
                    state.cold.remove(&old_key);
                } else {
                    state.hot.remove(&old_key);
                }
                if now_cold {
                    state.cold.insert(new_key, frame_id);
                } else {
                    state.hot.insert(new_key, frame_id);
                }
            }
        }
    }

    /// Selects and removes a victim frame, if any frame is evictable.
    ///
    /// Cold frames (fewer than K accesses, infinite backward distance) are
    /// scanned first, least recently accessed first; then hot frames by
    /// oldest K-th-most-recent access. The chosen frame is dropped from the
    /// replacer entirely.
    pub fn evict(&self) -> Option<FrameId> {
        let state = &mut *self.state.lock();
        if state.evictable == 0 {
            return None;
        }

        let pick = |index: &BTreeMap<u64, FrameId>, nodes: &HashMap<FrameId, LruKNode>| {
            index
                .iter()
                .find(|(_, fid)| nodes[fid].evictable)
                .map(|(&key, &fid)| (key, fid))
        };

        let victim = pick(&state.cold, &state.nodes)
            .map(|(key, fid)| (key, fid, true))
            .or_else(|| pick(&state.hot, &state.nodes).map(|(key, fid)| (key, fid, false)));

        let (key, frame_id, cold) = victim?;
        if cold {
            state.cold.remove(&key);
        } else {
            state.hot.remove(&key);
        }
        state.nodes.remove(&frame_id);
        state.evictable -= 1;

        tracing::trace!(frame_id = frame_id.index(), "selected eviction victim");
        Some(frame_id)
    }

    /// Marks `frame_id` as evictable or not.
    ///
    /// No-op for unknown frames or when the flag already has the requested
    /// value.
    ///
    /// # Panics
    ///
    /// Panics if `frame_id` is outside `[0, num_frames)`.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.check_frame(frame_id);
        let state = &mut *self.state.lock();
        let Some(node) = state.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.evictable == evictable {
            return;
        }
        node.evictable = evictable;
        if evictable {
            state.evictable += 1;
        } else {
            state.evictable -= 1;
        }
    }

    /// Drops `frame_id` from the replacer.
    ///
    /// No-op for unknown frames. The caller must ensure the frame is
    /// evictable; the buffer pool only calls this for unpinned frames.
    ///
    /// # Panics
    ///
    /// Panics if the frame is registered but not evictable, or if
    /// `frame_id` is outside `[0, num_frames)`.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let state = &mut *self.state.lock();
        let Some(node) = state.nodes.get(&frame_id) else {
            return;
        };
        assert!(
            node.evictable,
            "cannot remove non-evictable frame {} from the replacer",
            frame_id.index()
        );

        let is_cold = node.history.len() < self.k;
        let key = if is_cold {
            *node.history.back().expect("history is never empty")
        } else {
            *node.history.front().expect("history is never empty")
        };
        if is_cold {
            state.cold.remove(&key);
        } else {
            state.hot.remove(&key);
        }
        state.nodes.remove(&frame_id);
        state.evictable -= 1;
    }

    /// Returns the number of currently evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable
    }

    /// Returns the recency horizon K.
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    fn check_frame(&self, frame_id: FrameId) {
        assert!(
            frame_id.index() < self.num_frames,
            "frame id {} out of range (num_frames = {})",
            frame_id.index(),
            self.num_frames
        );
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruKReplacer")
            .field("num_frames", &self.num_frames)
            .field("k", &self.k)
            .field("tracked", &state.nodes.len())
            .field("evictable", &state.evictable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    fn record(replacer: &LruKReplacer, id: usize) {
        replacer.record_access(fid(id), AccessType::Unknown);
    }

    #[test]
    fn test_empty_replacer_evicts_nothing() {
        let replacer = LruKReplacer::new(8, 2);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_new_frames_default_to_non_evictable() {
        let replacer = LruKReplacer::new(8, 2);
        record(&replacer, 0);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);

        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn eviction_follows_oldest_kth_access() {
        // A B C D A B C D, all recorded twice with K=2: eviction order is
        // by the older of the two retained timestamps, so A, B, C, D.
        let replacer = LruKReplacer::new(8, 2);
        for _ in 0..2 {
            for id in 0..4 {
                record(&replacer, id);
            }
        }
        for id in 0..4 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn interleaved_tiebreak_k2() {
        // Accesses 1,2,3,4,1,2,3,4,1,2 at timestamps 1..10. Frames 3 and 4
        // retain histories [3,7] and [4,8]; frames 1 and 2 were touched a
        // third time, retaining [5,9] and [6,10]. Victim order follows the
        // oldest retained timestamp: 3, 4, 1, 2.
        let replacer = LruKReplacer::new(8, 2);
        for id in [1, 2, 3, 4, 1, 2, 3, 4, 1, 2] {
            record(&replacer, id);
        }
        for id in 1..=4 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
    }

    #[test]
    fn cold_frame_wins_over_hot() {
        // A frame with a single access has infinite backward distance and
        // is evicted before any fully-recorded frame, however recent.
        let replacer = LruKReplacer::new(8, 2);
        for id in [1, 2, 3, 4, 1, 2, 3, 4, 1, 2] {
            record(&replacer, id);
        }
        record(&replacer, 5);
        for id in 1..=5 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(5)));
        assert_eq!(replacer.evict(), Some(fid(3)));
    }

    #[test]
    fn cold_frames_evict_least_recently_accessed_first() {
        let replacer = LruKReplacer::new(8, 3);
        record(&replacer, 0);
        record(&replacer, 1);
        record(&replacer, 0); // 0 re-accessed; 1 is now the coldest
        for id in 0..2 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_evict_skips_non_evictable() {
        let replacer = LruKReplacer::new(8, 2);
        record(&replacer, 0);
        record(&replacer, 1);
        replacer.set_evictable(fid(1), true);

        // Frame 0 is older but pinned; the victim must be frame 1.
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_set_evictable_is_idempotent() {
        let replacer = LruKReplacer::new(8, 2);
        record(&replacer, 0);
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(0), true);
        assert_eq!(replacer.size(), 1);

        replacer.set_evictable(fid(0), false);
        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.size(), 0);

        // Unknown frames are tolerated.
        replacer.set_evictable(fid(5), true);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let replacer = LruKReplacer::new(8, 2);
        replacer.remove(fid(3));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_remove_evictable_frame() {
        let replacer = LruKReplacer::new(8, 2);
        record(&replacer, 0);
        record(&replacer, 1);
        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);

        replacer.remove(fid(0));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    #[should_panic(expected = "non-evictable")]
    fn test_remove_non_evictable_panics() {
        let replacer = LruKReplacer::new(8, 2);
        record(&replacer, 0);
        replacer.remove(fid(0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_frame_panics() {
        let replacer = LruKReplacer::new(4, 2);
        record(&replacer, 4);
    }

    #[test]
    fn test_reaccess_resorts_hot_frame() {
        let replacer = LruKReplacer::new(8, 2);
        record(&replacer, 0); // ts 1
        record(&replacer, 0); // ts 2, history [1,2]
        record(&replacer, 1); // ts 3
        record(&replacer, 1); // ts 4, history [3,4]
        record(&replacer, 0); // ts 5, history [2,5]

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        // Frame 0's K-th-most-recent access (2) is still older than frame
        // 1's (3); re-accessing did not make it younger than frame 1.
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
    }

    #[test]
    fn test_k_equals_one_degenerates_to_lru() {
        let replacer = LruKReplacer::new(8, 1);
        record(&replacer, 0);
        record(&replacer, 1);
        record(&replacer, 0); // 0 becomes most recent
        for id in 0..2 {
            replacer.set_evictable(fid(id), true);
        }

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(0)));
    }

    #[test]
    fn test_size_counts_only_evictable() {
        let replacer = LruKReplacer::new(8, 2);
        for id in 0..4 {
            record(&replacer, id);
        }
        assert_eq!(replacer.size(), 0);

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        assert_eq!(replacer.size(), 2);

        replacer.set_evictable(fid(0), false);
        assert_eq!(replacer.size(), 1);
    }
}
