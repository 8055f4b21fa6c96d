//! LRU cache of pages sitting between every other component and the pager.
//!
//! Pages are checked out through [`BufferPool::get_page`] or
//! [`BufferPool::new_page`], which both return a [`PageGuard`] — a scoped
//! handle that commits its edits and releases the pin when dropped, so
//! callers cannot accidentally hold page bytes past the pin scope (see the
//! pin/unpin design note in the project docs).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{DbError, DbResult};
use crate::page::{Page, PageId};
use crate::pager::Pager;

struct Inner {
    pages: HashMap<PageId, Page>,
    /// LRU order, least-recently-used at the front, most-recently-used at
    /// the back.
    order: Vec<PageId>,
    hits: u64,
    misses: u64,
}

pub struct BufferPool {
    pager: Arc<Pager>,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(pager: Arc<Pager>, capacity: usize) -> Self {
        Self {
            pager,
            capacity,
            inner: Mutex::new(Inner {
                pages: HashMap::new(),
                order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn get_page(&self, page_id: PageId) -> DbResult<PageGuard<'_>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.pages.contains_key(&page_id) {
            inner.hits += 1;
            touch(&mut inner.order, page_id);
            let page = inner.pages.get_mut(&page_id).unwrap();
            page.pin_count += 1;
            let snapshot = page.clone();
            return Ok(PageGuard::new(self, page_id, snapshot));
        }

        inner.misses += 1;
        if inner.pages.len() >= self.capacity {
            evict(&mut inner, &self.pager)?;
        }

        let mut page = self.pager.read_page(page_id)?;
        page.pin_count = 1;
        let snapshot = page.clone();
        inner.pages.insert(page_id, page);
        inner.order.push(page_id);
        Ok(PageGuard::new(self, page_id, snapshot))
    }

    /// Allocate a fresh page via the pager and place it in the cache
    /// already pinned, returning a guard for the caller to initialize.
    pub fn new_page(&self) -> DbResult<PageGuard<'_>> {
        let page = self.pager.allocate_page()?;
        let page_id = page.page_id;

        let mut inner = self.inner.lock().unwrap();
        if inner.pages.len() >= self.capacity {
            evict(&mut inner, &self.pager)?;
        }

        let mut cached = page.clone();
        cached.pin_count = 1;
        inner.pages.insert(page_id, cached);
        inner.order.push(page_id);
        Ok(PageGuard::new(self, page_id, page))
    }

    fn commit_and_unpin(&self, page_id: PageId, page: Page, dirty: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.pages.get_mut(&page_id) {
            slot.data = page.data;
            if dirty {
                slot.dirty = true;
            }
            slot.pin_count = slot.pin_count.saturating_sub(1);
        }
    }

    pub fn unpin_page(&self, page_id: PageId, dirty: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.pages.get_mut(&page_id) {
            slot.pin_count = slot.pin_count.saturating_sub(1);
            if dirty {
                slot.dirty = true;
            }
        }
    }

    pub fn flush_page(&self, page_id: PageId) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(page) = inner.pages.get_mut(&page_id) {
            if page.dirty {
                self.pager.write_page(page)?;
            }
        }
        Ok(())
    }

    pub fn flush_all(&self) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for page in inner.pages.values_mut() {
            if page.dirty {
                self.pager.write_page(page)?;
            }
        }
        Ok(())
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> BufferPoolStats {
        let inner = self.inner.lock().unwrap();
        BufferPoolStats {
            hits: inner.hits,
            misses: inner.misses,
            cached_pages: inner.pages.len(),
            capacity: self.capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub hits: u64,
    pub misses: u64,
    pub cached_pages: usize,
    pub capacity: usize,
}

fn touch(order: &mut Vec<PageId>, page_id: PageId) {
    if let Some(pos) = order.iter().position(|id| *id == page_id) {
        order.remove(pos);
    }
    order.push(page_id);
}

fn evict(inner: &mut Inner, pager: &Pager) -> DbResult<()> {
    let victim = inner
        .order
        .iter()
        .position(|id| inner.pages.get(id).map(|p| p.pin_count == 0).unwrap_or(false));

    let pos = victim.ok_or(DbError::AllPagesPinned)?;
    let page_id = inner.order.remove(pos);
    let mut page = inner.pages.remove(&page_id).unwrap();
    if page.dirty {
        debug!("evicting dirty page {}, flushing", page_id);
        pager.write_page(&mut page)?;
    } else {
        debug!("evicting clean page {}", page_id);
    }
    Ok(())
}

/// A scoped, pinned handle to a single page. Edits made through the
/// `write_*` methods are committed back to the pool and the pin released
/// when the guard is dropped; reads never mark the page dirty.
pub struct PageGuard<'a> {
    pool: &'a BufferPool,
    page_id: PageId,
    page: Option<Page>,
    dirty: bool,
}

impl<'a> PageGuard<'a> {
    fn new(pool: &'a BufferPool, page_id: PageId, page: Page) -> Self {
        Self {
            pool,
            page_id,
            page: Some(page),
            dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    fn page(&self) -> &Page {
        self.page.as_ref().unwrap()
    }

    fn page_mut(&mut self) -> &mut Page {
        self.page.as_mut().unwrap()
    }

    pub fn read_i32(&self, offset: usize) -> i32 {
        self.page().read_i32(offset)
    }

    pub fn write_i32(&mut self, offset: usize, value: i32) {
        self.dirty = true;
        self.page_mut().write_i32(offset, value);
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> &[u8] {
        self.page().read_bytes(offset, len)
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.dirty = true;
        self.page_mut().write_bytes(offset, bytes);
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            self.pool.commit_and_unpin(self.page_id, page, self.dirty);
        }
    }
}
