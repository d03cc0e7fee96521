//! In-memory disk manager for tests and ephemeral pools.

use std::collections::HashMap;

use parking_lot::RwLock;
use quill_common::types::PageId;

use super::error::DiskResult;
use super::DiskManager;

/// Disk manager that keeps every page in a map.
///
/// Useful for tests: the write-back tests inspect exactly which bytes the
/// buffer pool handed to the disk, and when.
#[derive(Default)]
pub struct MemoryDiskManager {
    pages: RwLock<HashMap<PageId, Box<[u8]>>>,
    writes: RwLock<HashMap<PageId, usize>>,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored bytes for `page_id`, if any were written.
    pub fn page_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages.read().get(&page_id).map(|p| p.to_vec())
    }

    /// Returns how many times `page_id` has been written.
    pub fn write_count(&self, page_id: PageId) -> usize {
        self.writes.read().get(&page_id).copied().unwrap_or(0)
    }

    /// Returns the number of distinct pages ever written.
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        match self.pages.read().get(&page_id) {
            Some(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                buf[n..].fill(0);
            }
            // Never written: reads back as zeroes.
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        self.pages.write().insert(page_id, data.into());
        *self.writes.write().entry(page_id).or_insert(0) += 1;
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) -> DiskResult<()> {
        self.pages.write().remove(&page_id);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("pages", &self.page_count())
            .finish()
    }
}
