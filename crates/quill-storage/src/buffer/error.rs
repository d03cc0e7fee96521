//! Buffer pool errors.

use quill_common::types::PageId;
use thiserror::Error;

use crate::disk::DiskError;

/// Result type for buffer pool operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer pool operations.
#[derive(Debug, Error)]
pub enum BufferError {
    /// No free frame and nothing evictable: every frame is pinned.
    #[error("no free frames available, all pages are pinned")]
    NoFreeFrames,

    /// The page is not resident in the buffer pool.
    #[error("page {page_id} is not resident in the buffer pool")]
    PageNotResident {
        /// The requested page.
        page_id: PageId,
    },

    /// The page's pin count is already zero.
    #[error("page {page_id} is not pinned")]
    NotPinned {
        /// The page whose pin count is zero.
        page_id: PageId,
    },

    /// The page is pinned and cannot be deleted.
    #[error("page {page_id} is pinned by {pin_count} holder(s)")]
    PagePinned {
        /// The pinned page.
        page_id: PageId,
        /// Its current pin count.
        pin_count: u32,
    },

    /// Disk I/O failed. Fatal: the frame contents are no longer trustworthy.
    #[error("disk error: {0}")]
    Disk(#[from] DiskError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong.
        message: String,
    },
}

impl BufferError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a transient error that can be retried once
    /// other holders release their pins.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoFreeFrames | Self::PagePinned { .. })
    }
}
