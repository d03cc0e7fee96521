//! Buffer Pool Manager for Quill.
//!
//! The buffer pool manages a fixed-size pool of in-memory page frames,
//! providing efficient caching of disk pages with the following features:
//!
//! - **Page Caching**: Keep frequently accessed pages in memory
//! - **Pin/Unpin**: Reference counting for safe concurrent access
//! - **Dirty Tracking**: Track modified pages for write-back
//! - **Eviction Policy**: LRU-K replacement keyed by the K-th most recent
//!   access
//! - **Page Guards**: RAII holders that unpin (and unlatch) on every exit
//!   path
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     BufferPoolManager                         │
//! │  ┌──────────────────────────┐  ┌───────────────────────────┐  │
//! │  │  Page Table              │  │  Free List                │  │
//! │  │  HashMap<PageId,FrameId> │  │  VecDeque<FrameId>        │  │
//! │  └──────────────────────────┘  └───────────────────────────┘  │
//! │                 (one mutex over both, held end-to-end)        │
//! │                              │                                │
//! │                              ▼                                │
//! │  ┌──────────────────────────────────────────────────────────┐ │
//! │  │                     Frame Array                          │ │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐     ┌─────────┐    │ │
//! │  │  │ Frame 0 │ │ Frame 1 │ │ Frame 2 │ ... │ Frame N │    │ │
//! │  │  │ page_id │ │ page_id │ │ page_id │     │ page_id │    │ │
//! │  │  │ data[]  │ │ data[]  │ │ data[]  │     │ data[]  │    │ │
//! │  │  │ dirty   │ │ dirty   │ │ dirty   │     │ dirty   │    │ │
//! │  │  │ pin_cnt │ │ pin_cnt │ │ pin_cnt │     │ pin_cnt │    │ │
//! │  │  └─────────┘ └─────────┘ └─────────┘     └─────────┘    │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! │                              │                                │
//! │                              ▼                                │
//! │  ┌──────────────────────────────────────────────────────────┐ │
//! │  │                    LRU-K Replacer                        │ │
//! │  │             (tracks eviction candidates)                 │ │
//! │  └──────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use quill_storage::buffer::{BufferPoolConfig, BufferPoolManager};
//! use quill_storage::disk::MemoryDiskManager;
//!
//! fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let disk = Arc::new(MemoryDiskManager::new());
//!     let pool = BufferPoolManager::new(BufferPoolConfig::new(64), disk, None)?;
//!
//!     let (page_id, mut guard) = pool.new_page_guarded()?;
//!     guard.data_mut()[0..5].copy_from_slice(b"hello");
//!     drop(guard); // unpins; the write latch is released first
//!
//!     let guard = pool.fetch_page_read(page_id)?;
//!     assert_eq!(&guard.data()[0..5], b"hello");
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

mod config;
mod error;
mod frame;
mod guard;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::{BufferError, BufferResult};
pub use frame::{FrameId, PageFrame};
pub use guard::{PageGuard, ReadPageGuard, WritePageGuard};
pub use pool::BufferPoolManager;
pub use replacer::{AccessType, LruKReplacer};

/// Statistics for buffer pool monitoring.
#[derive(Debug, Clone, Default)]
pub struct BufferPoolStats {
    /// Total number of page fetches.
    pub fetches: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (required disk read).
    pub misses: u64,
    /// Number of pages evicted.
    pub evictions: u64,
    /// Number of pages written back to disk.
    pub flushes: u64,
    /// Current number of pinned frames.
    pub pinned_frames: usize,
    /// Current number of dirty frames.
    pub dirty_frames: usize,
}

impl BufferPoolStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        if self.fetches == 0 {
            0.0
        } else {
            self.hits as f64 / self.fetches as f64
        }
    }
}
