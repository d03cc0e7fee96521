//! Write-ahead log hook.
//!
//! The buffer pool does not own a log format; it only honors the WAL rule:
//! before a dirty frame's bytes reach disk, the log must be flushed up to
//! that frame's LSN. [`LogManager`] is the thin handle the pool consumes for
//! that hook. Record layout, segments, and recovery live outside this core.

use std::sync::atomic::{AtomicU64, Ordering};

use quill_common::types::Lsn;

/// Hands out LSNs and tracks the flushed watermark.
#[derive(Debug, Default)]
pub struct LogManager {
    next_lsn: AtomicU64,
    flushed_lsn: AtomicU64,
}

impl LogManager {
    /// Creates a log manager starting at [`Lsn::FIRST`].
    pub fn new() -> Self {
        Self {
            next_lsn: AtomicU64::new(Lsn::FIRST.as_u64()),
            flushed_lsn: AtomicU64::new(Lsn::INVALID.as_u64()),
        }
    }

    /// Allocates the next LSN.
    pub fn next_lsn(&self) -> Lsn {
        Lsn::new(self.next_lsn.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the highest LSN known to be durable.
    pub fn flushed_lsn(&self) -> Lsn {
        Lsn::new(self.flushed_lsn.load(Ordering::Acquire))
    }

    /// Ensures the log is durable up to `lsn`.
    ///
    /// Called by the buffer pool before writing back a dirty frame. The
    /// watermark only moves forward.
    pub fn flush_to(&self, lsn: Lsn) {
        self.flushed_lsn
            .fetch_max(lsn.as_u64(), Ordering::AcqRel);
    }
}
