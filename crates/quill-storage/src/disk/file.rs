//! File-backed disk manager.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use quill_common::types::PageId;

use super::error::{DiskError, DiskResult};
use super::DiskManager;

/// Disk manager backed by a single data file.
///
/// Pages live at offset `page_id * page_size`. The file handle is wrapped in
/// a mutex; seek and transfer happen under it, so concurrent callers see
/// whole-page reads and writes.
pub struct FileDiskManager {
    /// The underlying data file.
    file: Mutex<File>,
    /// The file path.
    path: PathBuf,
    /// Page size in bytes.
    page_size: usize,
}

impl FileDiskManager {
    /// Opens (or creates) the data file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size,
        })
    }

    /// Returns the path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    fn offset_of(&self, page_id: PageId) -> u64 {
        page_id.as_u64() * self.page_size as u64
    }

    #[inline]
    fn check_buffer(&self, page_id: PageId, len: usize) -> DiskResult<()> {
        if len != self.page_size {
            return Err(DiskError::PageSizeMismatch {
                page_id,
                got: len,
                expected: self.page_size,
            });
        }
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> DiskResult<()> {
        self.check_buffer(page_id, buf.len())?;

        let mut file = self.file.lock();
        let file_len = file.metadata()?.len();
        let offset = self.offset_of(page_id);

        // Pages past the end of the file have never been written; they read
        // back as zeroes.
        if offset >= file_len {
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let available = ((file_len - offset) as usize).min(buf.len());
        file.read_exact(&mut buf[..available])?;
        buf[available..].fill(0);

        tracing::trace!(page_id = %page_id, "read page from disk");
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> DiskResult<()> {
        self.check_buffer(page_id, data.len())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.offset_of(page_id)))?;
        file.write_all(data)?;
        file.flush()?;

        tracing::trace!(page_id = %page_id, "wrote page to disk");
        Ok(())
    }

    fn deallocate_page(&self, _page_id: PageId) -> DiskResult<()> {
        // The file format keeps no free map; space is reclaimed when the
        // allocator reuses the slot.
        Ok(())
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 4096;

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let mut data = vec![0u8; PAGE_SIZE];
        data[0..4].copy_from_slice(&[1, 2, 3, 4]);
        disk.write_page(PageId::new(0), &data).unwrap();

        let mut buf = vec![0xffu8; PAGE_SIZE];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_read_past_eof_is_zeroes() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let mut buf = vec![0xffu8; PAGE_SIZE];
        disk.read_page(PageId::new(100), &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_pages_do_not_overlap() {
        let dir = tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db"), PAGE_SIZE).unwrap();

        let a = vec![0xaau8; PAGE_SIZE];
        let b = vec![0xbbu8; PAGE_SIZE];
        disk.write_page(PageId::new(0), &a).unwrap();
        disk.write_page(PageId::new(1), &b).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(0), &mut buf).unwrap();
        assert_eq!(buf, a);
        disk.read_page(PageId::new(1), &mut buf).unwrap();
        assert_eq!(buf, b);
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let data = vec![7u8; PAGE_SIZE];
        {
            let disk = FileDiskManager::open(&path, PAGE_SIZE).unwrap();
            disk.write_page(PageId::new(2), &data).unwrap();
        }

        let disk = FileDiskManager::open(&path, PAGE_SIZE).unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(PageId::new(2), &mut buf).unwrap();
        assert_eq!(buf, data);
    }
}
