//! Core types for Quill.

mod ids;

pub use ids::{Lsn, PageId};
