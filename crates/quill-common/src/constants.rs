//! System-wide constants for Quill.

// =============================================================================
// Page and Memory Constants
// =============================================================================

/// Default page size in bytes (8 KB).
///
/// This is a common page size that balances I/O efficiency with memory usage.
/// It matches the typical SSD block size and OS page size.
pub const DEFAULT_PAGE_SIZE: usize = 8 * 1024;

/// Minimum page size in bytes (512 B).
///
/// Pages smaller than one disk sector would make page-granular I/O pointless.
pub const MIN_PAGE_SIZE: usize = 512;

/// Maximum page size in bytes (64 KB).
pub const MAX_PAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 128;

/// Default recency horizon K for the LRU-K replacement policy.
///
/// LRU-2 is the classic choice: one re-reference separates hot pages from
/// pages touched once by a scan.
pub const DEFAULT_REPLACER_K: usize = 2;
