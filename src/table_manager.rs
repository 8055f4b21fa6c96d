//! Table-level operations: insert/scan/update/delete against a table's
//! heap pages. Operates on a `Catalog` passed in by the caller (the
//! `Engine`/executor own the catalog and are responsible for persisting it
//! after a mutating call); this keeps `TableManager` itself free of any
//! opinion about when a checkpoint happens.

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::record::Record;
use crate::record_manager::RecordManager;
use crate::schema::TableSchema;
use crate::types::Rid;

pub struct TableManager<'a> {
    buffer_pool: &'a BufferPool,
}

impl<'a> TableManager<'a> {
    pub fn new(buffer_pool: &'a BufferPool) -> Self {
        Self { buffer_pool }
    }

    pub fn create_table(&self, catalog: &mut Catalog, name: &str, schema: TableSchema) -> DbResult<()> {
        catalog.create_table(name, schema)
    }

    pub fn drop_table(&self, catalog: &mut Catalog, name: &str) -> DbResult<()> {
        catalog.drop_table(name)
    }

    /// Empties every data page belonging to `table` (tombstones nothing —
    /// resets each page's header so the whole page is reclaimed). Clearing
    /// the table's indexes is the caller's responsibility: `TableManager`
    /// has no knowledge of `IndexRegistry`.
    pub fn truncate_table(&self, catalog: &Catalog, name: &str) -> DbResult<()> {
        let rm = RecordManager::new(self.buffer_pool);
        for &page_id in catalog.table_pages(name)? {
            for (slot, _) in rm.get_records(page_id)? {
                rm.delete(page_id, slot)?;
            }
        }
        Ok(())
    }

    /// Scans every existing page of `table` for a record sharing the
    /// primary key (or, if none declared, every field) with `record`,
    /// failing fast — this is an O(N) scan over the whole table, matching
    /// the reference implementation rather than a dedicated index probe.
    fn assert_no_primary_key_collision(
        &self,
        catalog: &Catalog,
        schema: &TableSchema,
        table: &str,
        record: &Record,
    ) -> DbResult<()> {
        if schema.primary_key_columns().is_empty() {
            return Ok(());
        }
        let rm = RecordManager::new(self.buffer_pool);
        for &page_id in catalog.table_pages(table)? {
            for (_, existing) in rm.get_records(page_id)? {
                if existing.same_identity(record, schema) {
                    return Err(DbError::PrimaryKeyViolation);
                }
            }
        }
        Ok(())
    }

    /// Inserts `record`, trying each of the table's existing pages in
    /// order before allocating a new one. The primary-key uniqueness check
    /// runs before any physical write.
    pub fn insert_record(
        &self,
        catalog: &mut Catalog,
        schema: &TableSchema,
        table: &str,
        record: &Record,
    ) -> DbResult<Rid> {
        self.assert_no_primary_key_collision(catalog, schema, table, record)?;

        let rm = RecordManager::new(self.buffer_pool);
        let existing_pages: Vec<_> = catalog.table_pages(table)?.to_vec();
        for page_id in existing_pages {
            if let Some(slot) = rm.insert(page_id, record)? {
                return Ok(Rid::new(page_id, slot));
            }
        }

        let page_id = self.buffer_pool.new_page()?.page_id();
        catalog.append_table_page(table, page_id)?;
        let slot = rm
            .insert(page_id, record)?
            .expect("a freshly allocated page always has room for one record");
        Ok(Rid::new(page_id, slot))
    }

    pub fn scan_table(&self, catalog: &Catalog, table: &str) -> DbResult<Vec<Record>> {
        Ok(self
            .scan_table_with_locations(catalog, table)?
            .into_iter()
            .map(|(_, _, r)| r)
            .collect())
    }

    pub fn scan_table_with_locations(&self, catalog: &Catalog, table: &str) -> DbResult<Vec<(u32, u32, Record)>> {
        let rm = RecordManager::new(self.buffer_pool);
        let mut result = Vec::new();
        for &page_id in catalog.table_pages(table)? {
            for (slot, record) in rm.get_records(page_id)? {
                result.push((page_id, slot, record));
            }
        }
        Ok(result)
    }

    /// Overwrites in place when the new encoding fits in the old slot;
    /// otherwise tombstones the old slot and re-inserts, possibly onto a
    /// different page.
    pub fn update_at(
        &self,
        catalog: &mut Catalog,
        table: &str,
        page_id: u32,
        slot: u32,
        new_record: &Record,
    ) -> DbResult<Rid> {
        let rm = RecordManager::new(self.buffer_pool);
        if rm.update_in_place(page_id, slot, new_record)? {
            return Ok(Rid::new(page_id, slot));
        }
        rm.delete(page_id, slot)?;

        let existing_pages: Vec<_> = catalog.table_pages(table)?.to_vec();
        for candidate_page in existing_pages {
            if let Some(new_slot) = rm.insert(candidate_page, new_record)? {
                return Ok(Rid::new(candidate_page, new_slot));
            }
        }
        let new_page_id = self.buffer_pool.new_page()?.page_id();
        catalog.append_table_page(table, new_page_id)?;
        let new_slot = rm
            .insert(new_page_id, new_record)?
            .expect("a freshly allocated page always has room for one record");
        Ok(Rid::new(new_page_id, new_slot))
    }

    pub fn delete_at(&self, page_id: u32, slot: u32) -> DbResult<()> {
        RecordManager::new(self.buffer_pool).delete(page_id, slot)
    }

    /// Deletes every record for which `predicate` returns true, returning
    /// the count removed.
    pub fn delete_records(
        &self,
        catalog: &Catalog,
        table: &str,
        predicate: impl Fn(&Record) -> bool,
    ) -> DbResult<usize> {
        let rm = RecordManager::new(self.buffer_pool);
        let mut count = 0;
        for &page_id in catalog.table_pages(table)? {
            for (slot, record) in rm.get_records(page_id)? {
                if predicate(&record) {
                    rm.delete(page_id, slot)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::Pager;
    use crate::schema::Column;
    use crate::types::{ColumnType, Value};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn setup() -> (BufferPool, Catalog, TableSchema) {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Arc::new(Pager::open(tmp.path()).unwrap());
        let pool = BufferPool::new(pager, 16);
        let mut catalog = Catalog::default();
        let schema = TableSchema::new(vec![
            Column::new("id", ColumnType::Int).primary_key(),
            Column::new("name", ColumnType::Varchar),
        ]);
        catalog.create_table("t", schema.clone()).unwrap();
        (pool, catalog, schema)
    }

    fn rec(id: i32, name: &str) -> Record {
        Record::new(vec![Value::Int(id), Value::Varchar(name.to_string())])
    }

    #[test]
    fn insert_then_scan_round_trips() {
        let (pool, mut catalog, schema) = setup();
        let tm = TableManager::new(&pool);
        tm.insert_record(&mut catalog, &schema, "t", &rec(1, "A")).unwrap();
        tm.insert_record(&mut catalog, &schema, "t", &rec(2, "B")).unwrap();

        let rows = tm.scan_table(&catalog, "t").unwrap();
        assert_eq!(rows, vec![rec(1, "A"), rec(2, "B")]);
    }

    #[test]
    fn insert_rejects_primary_key_collision() {
        let (pool, mut catalog, schema) = setup();
        let tm = TableManager::new(&pool);
        tm.insert_record(&mut catalog, &schema, "t", &rec(1, "A")).unwrap();
        let err = tm.insert_record(&mut catalog, &schema, "t", &rec(1, "B")).unwrap_err();
        assert!(matches!(err, DbError::PrimaryKeyViolation));
    }

    #[test]
    fn delete_records_removes_matching_rows() {
        let (pool, mut catalog, schema) = setup();
        let tm = TableManager::new(&pool);
        tm.insert_record(&mut catalog, &schema, "t", &rec(1, "A")).unwrap();
        tm.insert_record(&mut catalog, &schema, "t", &rec(2, "B")).unwrap();

        let removed = tm
            .delete_records(&catalog, "t", |r| r.values[0] == Value::Int(1))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(tm.scan_table(&catalog, "t").unwrap(), vec![rec(2, "B")]);
    }

    #[test]
    fn update_at_relocates_when_new_length_differs() {
        let (pool, mut catalog, schema) = setup();
        let tm = TableManager::new(&pool);
        let rid = tm.insert_record(&mut catalog, &schema, "t", &rec(1, "A")).unwrap();

        let new_rid = tm
            .update_at(&mut catalog, "t", rid.page_id, rid.slot, &rec(1, "a much longer name"))
            .unwrap();
        let rows = tm.scan_table(&catalog, "t").unwrap();
        assert_eq!(rows, vec![rec(1, "a much longer name")]);
        assert_eq!(new_rid.page_id, rid.page_id);
    }
}
