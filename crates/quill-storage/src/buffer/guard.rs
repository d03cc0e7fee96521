//! Page guards: RAII holders for pinned (and latched) pages.
//!
//! Every guard owns one pin on its page and releases it on drop, on every
//! exit path. The latched variants additionally hold the frame's content
//! latch for their whole lifetime:
//!
//! - [`PageGuard`]: pin only; callers that mutate through it must
//!   [`mark_dirty`](PageGuard::mark_dirty) (or use `data_mut`, which does)
//! - [`ReadPageGuard`]: read latch; unpins clean
//! - [`WritePageGuard`]: write latch; unpins dirty
//!
//! Drop order is latch first, then unpin. A flusher blocked on the latch
//! holds the manager mutex, so the latch must be released before the unpin
//! tries to take that mutex.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use quill_common::types::{Lsn, PageId};

use super::frame::{FrameId, PageDataReadGuard, PageDataWriteGuard, PageFrame};
use super::pool::BufferPoolManager;

/// Basic guard: owns a pin, takes no latch.
///
/// Dropping the guard unpins with `is_dirty = false` unless the holder
/// called [`mark_dirty`](Self::mark_dirty) or wrote through
/// [`data_mut`](Self::data_mut).
pub struct PageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<PageFrame>,
    page_id: PageId,
    dirty: bool,
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, page_id: PageId, frame: Arc<PageFrame>) -> Self {
        Self {
            pool,
            frame,
            page_id,
            dirty: false,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Records that the holder mutated the page.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns a reference to the page data.
    ///
    /// Takes the frame's content latch transiently for the borrow.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a mutable reference to the page data and marks the guard
    /// dirty.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.dirty = true;
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        let _ = self.pool.unpin_page(self.page_id, self.dirty);
    }
}

impl std::fmt::Debug for PageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Helper struct providing `Deref` for transiently latched page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Box<[u8]>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Helper struct providing `DerefMut` for transiently latched page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Box<[u8]>>,
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

/// Read guard: pin plus the frame's read latch, held until drop.
///
/// Concurrent readers of the same page proceed in parallel; a writer waits.
/// Dropping releases the latch, then unpins clean.
pub struct ReadPageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<PageFrame>,
    page_id: PageId,
    /// `Some` until drop; taken first so the latch is released before the
    /// unpin takes the manager mutex.
    latch: Option<PageDataReadGuard>,
}

impl<'a> ReadPageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, page_id: PageId, frame: Arc<PageFrame>) -> Self {
        let latch = frame.latch_read();
        Self {
            pool,
            frame,
            page_id,
            latch: Some(latch),
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns the page data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.latch.as_deref().expect("latch held until drop")
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        self.latch.take();
        let _ = self.pool.unpin_page(self.page_id, false);
    }
}

impl std::fmt::Debug for ReadPageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadPageGuard")
            .field("page_id", &self.page_id)
            .finish()
    }
}

/// Write guard: pin plus the frame's write latch, held until drop.
///
/// Dropping releases the latch, then unpins with `is_dirty = true`.
pub struct WritePageGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<PageFrame>,
    page_id: PageId,
    /// `Some` until drop; see [`ReadPageGuard::latch`].
    latch: Option<PageDataWriteGuard>,
}

impl<'a> WritePageGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, page_id: PageId, frame: Arc<PageFrame>) -> Self {
        let latch = frame.latch_write();
        Self {
            pool,
            frame,
            page_id,
            latch: Some(latch),
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns the page data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.latch.as_deref().expect("latch held until drop")
    }

    /// Returns the page data mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.latch.as_deref_mut().expect("latch held until drop")
    }

    /// Stamps the frame with the LSN of the mutation, for the write-ahead
    /// hook.
    #[inline]
    pub fn set_lsn(&self, lsn: Lsn) {
        self.frame.set_lsn(lsn);
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.latch.take();
        let _ = self.pool.unpin_page(self.page_id, true);
    }
}

impl std::fmt::Debug for WritePageGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePageGuard")
            .field("page_id", &self.page_id)
            .finish()
    }
}
