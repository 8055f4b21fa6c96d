//! Tracks every index's identity and root page, independent of the B+ tree
//! implementation itself — `get_index` just materializes a thin
//! `BPlusTree` accessor pointed at the stored root.

use std::collections::HashMap;
use std::io::Cursor;

use crate::btree::BPlusTree;
use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::io::{Decodeable, Encodeable};
use crate::page::{PageId, PAGE_SIZE};
use crate::record::Record;
use crate::schema::TableSchema;
use crate::types::Rid;

/// Fixed page the index registry blob lives at, one past the catalog page.
pub const INDEX_REGISTRY_PAGE_ID: PageId = 2;

/// Sentinel root page id for a synthesized, non-persisted index entry
/// (a primary key or UNIQUE column that has no real B+ tree backing it
/// yet). Callers treat this as "fall back to a table scan".
pub const NO_BACKING_INDEX: PageId = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub index_name: String,
    pub table_name: String,
    pub column_name: String,
    pub root_page_id: PageId,
    pub is_unique: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexRegistry {
    indexes: HashMap<String, IndexMeta>,
    by_table: HashMap<String, Vec<String>>,
}

impl IndexRegistry {
    pub fn create_index(
        &mut self,
        buffer_pool: &BufferPool,
        name: &str,
        table: &str,
        column: &str,
        unique: bool,
    ) -> DbResult<()> {
        if self.indexes.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        let root_page_id = buffer_pool.new_page()?.page_id();
        crate::btree::init_leaf_page(buffer_pool, root_page_id)?;
        self.indexes.insert(
            name.to_string(),
            IndexMeta {
                index_name: name.to_string(),
                table_name: table.to_string(),
                column_name: column.to_string(),
                root_page_id,
                is_unique: unique,
            },
        );
        self.by_table.entry(table.to_string()).or_default().push(name.to_string());
        Ok(())
    }

    pub fn drop_index(&mut self, name: &str) -> DbResult<()> {
        let meta = self
            .indexes
            .remove(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
        if let Some(names) = self.by_table.get_mut(&meta.table_name) {
            names.retain(|n| n != name);
        }
        Ok(())
    }

    pub fn get_index(&self, name: &str) -> DbResult<&IndexMeta> {
        self.indexes.get(name).ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn update_root(&mut self, name: &str, new_root: PageId) -> DbResult<()> {
        let meta = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
        meta.root_page_id = new_root;
        Ok(())
    }

    pub fn indexes_for_table(&self, table: &str) -> Vec<&IndexMeta> {
        self.by_table
            .get(table)
            .map(|names| names.iter().filter_map(|n| self.indexes.get(n)).collect())
            .unwrap_or_default()
    }

    pub fn insert_into_indexes(
        &mut self,
        buffer_pool: &BufferPool,
        order: usize,
        schema: &TableSchema,
        table: &str,
        record: &Record,
        rid: Rid,
    ) -> DbResult<()> {
        let names: Vec<String> = self
            .by_table
            .get(table)
            .cloned()
            .unwrap_or_default();
        for name in names {
            let meta = self.indexes.get(&name).unwrap().clone();
            let col_idx = match schema.column_index(&meta.column_name) {
                Some(i) => i,
                None => continue,
            };
            let value = &record.values[col_idx];
            if value.is_null() {
                continue;
            }
            let mut tree = BPlusTree::new(buffer_pool, order, meta.root_page_id);
            tree.insert(value.clone(), rid, meta.is_unique)?;
            if tree.root_page_id() != meta.root_page_id {
                self.update_root(&name, tree.root_page_id())?;
            }
        }
        Ok(())
    }

    /// Every unique index on `table`, plus a synthesized, non-persisted
    /// entry (root page [`NO_BACKING_INDEX`]) for every primary-key or
    /// UNIQUE column not already covered by a real index — so the
    /// executor's unique-probe step always has something to consult, even
    /// before `CREATE UNIQUE INDEX` has been run for that column.
    pub fn get_unique_indexes_for_table(&self, table: &str, schema: &TableSchema) -> Vec<IndexMeta> {
        let mut result: Vec<IndexMeta> = self
            .indexes_for_table(table)
            .into_iter()
            .filter(|m| m.is_unique)
            .cloned()
            .collect();

        for column in &schema.columns {
            if !(column.primary_key || column.unique) {
                continue;
            }
            let already_covered = result.iter().any(|m| m.column_name == column.name);
            if already_covered {
                continue;
            }
            result.push(IndexMeta {
                index_name: format!("__synthesized_{}_{}", table, column.name),
                table_name: table.to_string(),
                column_name: column.name.clone(),
                root_page_id: NO_BACKING_INDEX,
                is_unique: true,
            });
        }
        result
    }
}

impl Encodeable for IndexMeta {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend(self.index_name.encode());
        buf.extend(self.table_name.encode());
        buf.extend(self.column_name.encode());
        buf.extend(self.root_page_id.encode());
        buf.extend(self.is_unique.encode());
        buf
    }
}

impl Decodeable for IndexMeta {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        Self {
            index_name: String::decode_from(reader),
            table_name: String::decode_from(reader),
            column_name: String::decode_from(reader),
            root_page_id: PageId::decode_from(reader),
            is_unique: bool::decode_from(reader),
        }
    }
}

impl Encodeable for IndexRegistry {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend((self.indexes.len() as u32).encode());
        for meta in self.indexes.values() {
            buf.extend(meta.encode());
        }
        buf
    }
}

impl Decodeable for IndexRegistry {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let mut registry = IndexRegistry::default();
        let count = u32::decode_from(reader);
        for _ in 0..count {
            let meta = IndexMeta::decode_from(reader);
            registry
                .by_table
                .entry(meta.table_name.clone())
                .or_default()
                .push(meta.index_name.clone());
            registry.indexes.insert(meta.index_name.clone(), meta);
        }
        registry
    }
}

pub struct IndexRegistryStore<'a> {
    buffer_pool: &'a BufferPool,
}

impl<'a> IndexRegistryStore<'a> {
    pub fn new(buffer_pool: &'a BufferPool) -> Self {
        Self { buffer_pool }
    }

    pub fn load(&self) -> DbResult<IndexRegistry> {
        let guard = self.buffer_pool.get_page(INDEX_REGISTRY_PAGE_ID)?;
        let len = guard.read_i32(0);
        if len <= 0 {
            return Ok(IndexRegistry::default());
        }
        let bytes = guard.read_bytes(4, len as usize).to_vec();
        Ok(IndexRegistry::decode_from(&mut Cursor::new(bytes)))
    }

    pub fn save(&self, registry: &IndexRegistry) -> DbResult<()> {
        let bytes = registry.encode();
        if bytes.len() + 4 > PAGE_SIZE {
            return Err(DbError::CorruptPage {
                page_id: INDEX_REGISTRY_PAGE_ID,
                reason: "index registry blob exceeds one page".to_string(),
            });
        }
        let mut guard = self.buffer_pool.get_page(INDEX_REGISTRY_PAGE_ID)?;
        guard.write_i32(0, bytes.len() as i32);
        guard.write_bytes(4, &bytes);
        Ok(())
    }
}
