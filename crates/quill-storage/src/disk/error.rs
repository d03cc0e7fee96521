//! Disk manager errors.

use std::io;

use quill_common::types::PageId;
use thiserror::Error;

/// Result type for disk manager operations.
pub type DiskResult<T> = Result<T, DiskError>;

/// Errors that can occur during disk I/O.
#[derive(Debug, Error)]
pub enum DiskError {
    /// Underlying I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// The OS-level error.
        #[from]
        source: io::Error,
    },

    /// A transfer buffer did not match the page size.
    #[error("buffer for page {page_id} is {got} bytes, expected {expected}")]
    PageSizeMismatch {
        /// The page being transferred.
        page_id: PageId,
        /// Bytes supplied by the caller.
        got: usize,
        /// The configured page size.
        expected: usize,
    },
}
