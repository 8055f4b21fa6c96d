//! Slotted heap page operations: the only component that understands the
//! page-internal byte layout described in the data model (§3).

use log::warn;

use crate::buffer_pool::BufferPool;
use crate::error::DbResult;
use crate::io::{Decodeable, Encodeable};
use crate::page::{PageId, PAGE_SIZE};
use crate::record::Record;

pub const SLOT_DIRECTORY_OFFSET: usize = 8;
pub const MAX_SLOTS: u32 = 200;
pub const DATA_START: i32 = 808;
const TOMBSTONE: i32 = -1;

pub struct RecordManager<'a> {
    buffer_pool: &'a BufferPool,
}

impl<'a> RecordManager<'a> {
    pub fn new(buffer_pool: &'a BufferPool) -> Self {
        Self { buffer_pool }
    }

    fn slot_offset(slot: u32) -> usize {
        SLOT_DIRECTORY_OFFSET + slot as usize * 4
    }

    /// Inserts `record` into `page_id`'s slot directory, returning the slot
    /// index it landed in, or `Ok(None)` if the page has no room (full slot
    /// directory or insufficient free space) — the caller tries the next
    /// page or allocates a new one.
    pub fn insert(&self, page_id: PageId, record: &Record) -> DbResult<Option<u32>> {
        let mut guard = self.buffer_pool.get_page(page_id)?;

        let mut count = guard.read_i32(0);
        let mut free = guard.read_i32(4);
        if free < DATA_START || free as usize > PAGE_SIZE || count < 0 {
            count = 0;
            free = DATA_START;
        }

        if count as u32 >= MAX_SLOTS {
            return Ok(None);
        }

        let bytes = record.encode();
        let needed = 4 + bytes.len();
        if free as usize + needed > PAGE_SIZE {
            return Ok(None);
        }

        guard.write_i32(free as usize, bytes.len() as i32);
        guard.write_bytes(free as usize + 4, &bytes);

        let slot = count as u32;
        guard.write_i32(Self::slot_offset(slot), free);

        guard.write_i32(0, count + 1);
        guard.write_i32(4, free + needed as i32);
        Ok(Some(slot))
    }

    /// Returns every live `(slot, record)` pair on the page, skipping
    /// tombstoned slots. A corrupted slot (out-of-range offset or
    /// unparsable payload) is logged and skipped rather than aborting the
    /// whole scan.
    pub fn get_records(&self, page_id: PageId) -> DbResult<Vec<(u32, Record)>> {
        let guard = self.buffer_pool.get_page(page_id)?;
        let count = guard.read_i32(0).max(0) as u32;

        let mut records = Vec::new();
        for slot in 0..count {
            let offset = guard.read_i32(Self::slot_offset(slot));
            if offset == TOMBSTONE {
                continue;
            }
            if offset < DATA_START || offset as usize + 4 > PAGE_SIZE {
                warn!("page {} slot {} has corrupt offset {}, skipping", page_id, slot, offset);
                continue;
            }
            let len = guard.read_i32(offset as usize);
            if len < 0 || offset as usize + 4 + len as usize > PAGE_SIZE {
                warn!("page {} slot {} has corrupt length {}, skipping", page_id, slot, len);
                continue;
            }
            let bytes = guard.read_bytes(offset as usize + 4, len as usize);
            let mut cursor = std::io::Cursor::new(bytes);
            records.push((slot, Record::decode_from(&mut cursor)));
        }
        Ok(records)
    }

    pub fn get_record(&self, page_id: PageId, slot: u32) -> DbResult<Option<Record>> {
        Ok(self
            .get_records(page_id)?
            .into_iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, r)| r))
    }

    pub fn delete(&self, page_id: PageId, slot: u32) -> DbResult<()> {
        let mut guard = self.buffer_pool.get_page(page_id)?;
        guard.write_i32(Self::slot_offset(slot), TOMBSTONE);
        Ok(())
    }

    /// Overwrites a slot's payload in place when the new encoding is
    /// exactly the same length as the old one, returning `true`. Returns
    /// `false` when the lengths differ, in which case the caller must
    /// tombstone this slot and re-insert elsewhere.
    pub fn update_in_place(&self, page_id: PageId, slot: u32, record: &Record) -> DbResult<bool> {
        let mut guard = self.buffer_pool.get_page(page_id)?;
        let offset = guard.read_i32(Self::slot_offset(slot));
        if offset == TOMBSTONE {
            return Ok(false);
        }
        let old_len = guard.read_i32(offset as usize);
        let bytes = record.encode();
        if bytes.len() as i32 != old_len {
            return Ok(false);
        }
        guard.write_bytes(offset as usize + 4, &bytes);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::Pager;
    use crate::types::Value;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn setup() -> (BufferPool, PageId) {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Arc::new(Pager::open(tmp.path()).unwrap());
        let pool = BufferPool::new(pager, 16);
        let page_id = pool.new_page().unwrap().page_id();
        (pool, page_id)
    }

    fn rec(id: i32, name: &str) -> Record {
        Record::new(vec![Value::Int(id), Value::Varchar(name.to_string())])
    }

    #[test]
    fn insert_then_get_records_round_trips() {
        let (pool, page_id) = setup();
        let rm = RecordManager::new(&pool);
        let slot_a = rm.insert(page_id, &rec(1, "A")).unwrap().unwrap();
        let slot_b = rm.insert(page_id, &rec(2, "B")).unwrap().unwrap();
        assert_eq!(slot_a, 0);
        assert_eq!(slot_b, 1);

        let records = rm.get_records(page_id).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, rec(1, "A"));
        assert_eq!(records[1].1, rec(2, "B"));
    }

    #[test]
    fn delete_tombstones_the_slot() {
        let (pool, page_id) = setup();
        let rm = RecordManager::new(&pool);
        let slot = rm.insert(page_id, &rec(1, "A")).unwrap().unwrap();
        rm.insert(page_id, &rec(2, "B")).unwrap();
        rm.delete(page_id, slot).unwrap();

        let records = rm.get_records(page_id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, rec(2, "B"));
    }

    #[test]
    fn update_in_place_only_when_length_matches() {
        let (pool, page_id) = setup();
        let rm = RecordManager::new(&pool);
        let slot = rm.insert(page_id, &rec(1, "AA")).unwrap().unwrap();

        assert!(rm.update_in_place(page_id, slot, &rec(1, "BB")).unwrap());
        assert_eq!(rm.get_record(page_id, slot).unwrap().unwrap(), rec(1, "BB"));

        assert!(!rm
            .update_in_place(page_id, slot, &rec(1, "much longer name"))
            .unwrap());
    }

    #[test]
    fn insert_fails_once_slot_directory_is_full() {
        let (pool, page_id) = setup();
        let rm = RecordManager::new(&pool);
        for i in 0..MAX_SLOTS {
            assert!(rm.insert(page_id, &rec(i as i32, "x")).unwrap().is_some());
        }
        assert!(rm.insert(page_id, &rec(9999, "x")).unwrap().is_none());
    }
}
