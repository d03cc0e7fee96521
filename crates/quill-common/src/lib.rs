//! # quill-common
//!
//! Common types and constants for Quill.
//!
//! This crate provides the foundational pieces shared by the Quill storage
//! runtime:
//!
//! - **Types**: Core identifiers (`PageId`, `Lsn`)
//! - **Constants**: System-wide constants and limits
//!
//! ## Example
//!
//! ```rust
//! use quill_common::types::{Lsn, PageId};
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert!(!Lsn::INVALID.is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use types::{Lsn, PageId};
