//! Page-level I/O against a single database file.
//!
//! Page 0 is the file header: a 4-byte little-endian `next_page_id`
//! watermark, followed by unused bytes. Every other page is either a heap
//! page, a B+ tree node page, or the catalog blob page — the pager does not
//! distinguish between them, it only allocates and moves fixed-size bytes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use log::debug;

use crate::error::{DbError, DbResult};
use crate::page::{Page, PageId, PAGE_SIZE};

/// Heap pages start life with `record_count = 0` and `free_space_offset = 8`
/// (not yet re-stamped to the slot-directory-aware `808` — `RecordManager`
/// re-initializes a page the first time it actually stores a record there).
const FRESH_FREE_OFFSET: i32 = 8;

struct PagerState {
    file: File,
    next_page_id: PageId,
}

pub struct Pager {
    state: Mutex<PagerState>,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let is_new = !path.as_ref().exists();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let next_page_id = if is_new {
            let header = [0u8; PAGE_SIZE];
            file.write_all(&header)?;
            file.flush()?;
            let mut pager = PagerState {
                file,
                next_page_id: 1,
            };
            pager.save_header()?;
            return Ok(Self {
                state: Mutex::new(pager),
            });
        } else {
            let mut buf = [0u8; 4];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)?;
            u32::from_le_bytes(buf)
        };

        Ok(Self {
            state: Mutex::new(PagerState {
                file,
                next_page_id,
            }),
        })
    }

    pub fn allocate_page(&self) -> DbResult<Page> {
        let mut state = self.state.lock().unwrap();
        let page_id = state.next_page_id;
        state.next_page_id += 1;
        state.save_header()?;

        let mut page = Page::new(page_id);
        page.write_i32(0, 0);
        page.write_i32(4, FRESH_FREE_OFFSET);
        state.write_page(&page)?;
        page.dirty = false;
        debug!("allocated page {}", page_id);
        Ok(page)
    }

    pub fn read_page(&self, page_id: PageId) -> DbResult<Page> {
        let mut state = self.state.lock().unwrap();
        if page_id >= state.next_page_id {
            return Err(DbError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("page {} does not exist", page_id),
            )));
        }
        state.read_page(page_id)
    }

    pub fn write_page(&self, page: &mut Page) -> DbResult<()> {
        let state = self.state.lock().unwrap();
        state.write_page_locked(page)?;
        page.dirty = false;
        Ok(())
    }

    pub fn next_page_id(&self) -> PageId {
        self.state.lock().unwrap().next_page_id
    }
}

impl PagerState {
    fn save_header(&mut self) -> DbResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.next_page_id.to_le_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId) -> DbResult<Page> {
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; PAGE_SIZE];
        self.file.read_exact(&mut buf)?;
        Ok(Page::from_bytes(page_id, buf))
    }

    fn write_page(&mut self, page: &Page) -> DbResult<()> {
        self.write_page_locked(page)
    }

    fn write_page_locked(&mut self, page: &Page) -> DbResult<()> {
        let offset = page.page_id as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.data.as_ref())?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn allocate_bumps_watermark_and_initializes_heap_header() {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Pager::open(tmp.path()).unwrap();

        let p1 = pager.allocate_page().unwrap();
        let p2 = pager.allocate_page().unwrap();
        assert_eq!(p1.page_id, 1);
        assert_eq!(p2.page_id, 2);
        assert_eq!(pager.next_page_id(), 3);

        assert_eq!(p1.read_i32(0), 0);
        assert_eq!(p1.read_i32(4), 8);
    }

    #[test]
    fn read_page_rejects_unallocated_ids() {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Pager::open(tmp.path()).unwrap();
        assert!(pager.read_page(5).is_err());
    }

    #[test]
    fn write_then_read_round_trips_bytes() {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Pager::open(tmp.path()).unwrap();

        let mut page = pager.allocate_page().unwrap();
        page.write_bytes(900, b"hello world");
        pager.write_page(&mut page).unwrap();

        let reloaded = pager.read_page(page.page_id).unwrap();
        assert_eq!(reloaded.read_bytes(900, 11), b"hello world");
    }

    #[test]
    fn watermark_survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let pager = Pager::open(tmp.path()).unwrap();
            pager.allocate_page().unwrap();
            pager.allocate_page().unwrap();
        }
        let pager = Pager::open(tmp.path()).unwrap();
        assert_eq!(pager.next_page_id(), 3);
    }
}
