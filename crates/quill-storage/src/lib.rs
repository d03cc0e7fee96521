//! # quill-storage
//!
//! Storage runtime for Quill.
//!
//! This crate implements the in-memory side of the storage engine:
//!
//! - A **buffer pool manager** caching fixed-size disk pages in a bounded
//!   set of frames, with pinning, dirty tracking, and write-back
//! - An **LRU-K replacer** choosing eviction victims by K-th most recent
//!   access
//! - **Page guards** that keep frames pinned and latched for exactly as
//!   long as a caller holds them
//! - A **disk manager** seam with file-backed and in-memory implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager, replacer, frames, and page guards
pub mod buffer;

/// Disk manager trait and implementations
pub mod disk;

/// Write-ahead log hook
pub mod wal;
