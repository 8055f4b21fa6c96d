//! The system catalog: table schemas, each table's page list, and the
//! metadata-only objects (views, users, triggers) layered on top. The
//! whole structure is persisted as one length-prefixed encoded blob on a
//! single well-known page.

use std::collections::HashMap;
use std::io::Cursor;

use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::io::{read_exact, Decodeable, Encodeable};
use crate::page::{PageId, PAGE_SIZE};
use crate::schema::TableSchema;

/// Fixed page id the catalog blob lives at. Distinct from the pager's own
/// page-0 watermark header; this is the first page a fresh database file
/// allocates.
pub const CATALOG_PAGE_ID: PageId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMeta {
    pub name: String,
    pub table: String,
    pub event: TriggerEvent,
    pub timing: TriggerTiming,
    /// Trigger body source text; executing it is delegated to the
    /// external statement executor that drives this core, not implemented
    /// here.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewMeta {
    pub name: String,
    pub query_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMeta {
    pub name: String,
    pub privileges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub tables: HashMap<String, TableSchema>,
    pub table_pages: HashMap<String, Vec<PageId>>,
    pub views: HashMap<String, ViewMeta>,
    pub users: HashMap<String, UserMeta>,
    pub triggers: HashMap<String, TriggerMeta>,
}

impl Catalog {
    pub fn create_table(&mut self, name: &str, schema: TableSchema) -> DbResult<()> {
        if self.tables.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        self.tables.insert(name.to_string(), schema);
        self.table_pages.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub fn drop_table(&mut self, name: &str) -> DbResult<()> {
        if self.tables.remove(name).is_none() {
            return Err(DbError::TableNotFound(name.to_string()));
        }
        self.table_pages.remove(name);
        Ok(())
    }

    pub fn table_schema(&self, name: &str) -> DbResult<&TableSchema> {
        self.tables.get(name).ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_schema_mut(&mut self, name: &str) -> DbResult<&mut TableSchema> {
        self.tables.get_mut(name).ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_pages(&self, name: &str) -> DbResult<&[PageId]> {
        self.table_pages
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn append_table_page(&mut self, name: &str, page_id: PageId) -> DbResult<()> {
        self.table_pages
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))?
            .push(page_id);
        Ok(())
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    pub fn create_view(&mut self, name: &str, query_text: String) -> DbResult<()> {
        if self.views.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        self.views.insert(
            name.to_string(),
            ViewMeta {
                name: name.to_string(),
                query_text,
            },
        );
        Ok(())
    }

    pub fn drop_view(&mut self, name: &str) -> DbResult<()> {
        self.views
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn create_user(&mut self, name: &str) -> DbResult<()> {
        if self.users.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        self.users.insert(
            name.to_string(),
            UserMeta {
                name: name.to_string(),
                privileges: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn drop_user(&mut self, name: &str) -> DbResult<()> {
        self.users
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn grant(&mut self, user: &str, privilege: &str) -> DbResult<()> {
        let entry = self
            .users
            .get_mut(user)
            .ok_or_else(|| DbError::TableNotFound(user.to_string()))?;
        if !entry.privileges.iter().any(|p| p == privilege) {
            entry.privileges.push(privilege.to_string());
        }
        Ok(())
    }

    pub fn revoke(&mut self, user: &str, privilege: &str) -> DbResult<()> {
        let entry = self
            .users
            .get_mut(user)
            .ok_or_else(|| DbError::TableNotFound(user.to_string()))?;
        entry.privileges.retain(|p| p != privilege);
        Ok(())
    }

    pub fn create_trigger(&mut self, trigger: TriggerMeta) -> DbResult<()> {
        if self.triggers.contains_key(&trigger.name) {
            return Err(DbError::TableExists(trigger.name.clone()));
        }
        self.triggers.insert(trigger.name.clone(), trigger);
        Ok(())
    }

    pub fn drop_trigger(&mut self, name: &str) -> DbResult<()> {
        self.triggers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn triggers_for(&self, table: &str, event: TriggerEvent, timing: TriggerTiming) -> Vec<&TriggerMeta> {
        self.triggers
            .values()
            .filter(|t| t.table == table && t.event == event && t.timing == timing)
            .collect()
    }
}

impl Encodeable for Catalog {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend((self.tables.len() as u32).encode());
        for (name, schema) in &self.tables {
            buf.extend(name.encode());
            buf.extend(schema.encode());
            let pages = self.table_pages.get(name).cloned().unwrap_or_default();
            buf.extend((pages.len() as u32).encode());
            for p in pages {
                buf.extend(p.encode());
            }
        }

        buf.extend((self.views.len() as u32).encode());
        for view in self.views.values() {
            buf.extend(view.name.encode());
            buf.extend(view.query_text.encode());
        }

        buf.extend((self.users.len() as u32).encode());
        for user in self.users.values() {
            buf.extend(user.name.encode());
            buf.extend((user.privileges.len() as u32).encode());
            for p in &user.privileges {
                buf.extend(p.encode());
            }
        }

        buf.extend((self.triggers.len() as u32).encode());
        for trigger in self.triggers.values() {
            buf.extend(trigger.name.encode());
            buf.extend(trigger.table.encode());
            buf.push(match trigger.event {
                TriggerEvent::Insert => 0,
                TriggerEvent::Update => 1,
                TriggerEvent::Delete => 2,
            });
            buf.push(match trigger.timing {
                TriggerTiming::Before => 0,
                TriggerTiming::After => 1,
            });
            buf.extend(trigger.body.encode());
        }
        buf
    }
}

impl Decodeable for Catalog {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
        let mut catalog = Catalog::default();

        let table_count = u32::decode_from(reader);
        for _ in 0..table_count {
            let name = String::decode_from(reader);
            let schema = TableSchema::decode_from(reader);
            let page_count = u32::decode_from(reader);
            let mut pages = Vec::with_capacity(page_count as usize);
            for _ in 0..page_count {
                pages.push(u32::decode_from(reader));
            }
            catalog.tables.insert(name.clone(), schema);
            catalog.table_pages.insert(name, pages);
        }

        let view_count = u32::decode_from(reader);
        for _ in 0..view_count {
            let name = String::decode_from(reader);
            let query_text = String::decode_from(reader);
            catalog.views.insert(name.clone(), ViewMeta { name, query_text });
        }

        let user_count = u32::decode_from(reader);
        for _ in 0..user_count {
            let name = String::decode_from(reader);
            let priv_count = u32::decode_from(reader);
            let mut privileges = Vec::with_capacity(priv_count as usize);
            for _ in 0..priv_count {
                privileges.push(String::decode_from(reader));
            }
            catalog.users.insert(name.clone(), UserMeta { name, privileges });
        }

        let trigger_count = u32::decode_from(reader);
        for _ in 0..trigger_count {
            let name = String::decode_from(reader);
            let table = String::decode_from(reader);
            let event = match read_exact(reader, 1)[0] {
                0 => TriggerEvent::Insert,
                1 => TriggerEvent::Update,
                2 => TriggerEvent::Delete,
                other => panic!("corrupt trigger event tag: {}", other),
            };
            let timing = match read_exact(reader, 1)[0] {
                0 => TriggerTiming::Before,
                1 => TriggerTiming::After,
                other => panic!("corrupt trigger timing tag: {}", other),
            };
            let body = String::decode_from(reader);
            catalog.triggers.insert(
                name.clone(),
                TriggerMeta {
                    name,
                    table,
                    event,
                    timing,
                    body,
                },
            );
        }

        catalog
    }
}

/// Loads and saves the catalog blob against the buffer pool. Kept separate
/// from `Catalog` itself so in-memory catalog logic can be unit-tested
/// without a backing page.
pub struct CatalogStore<'a> {
    buffer_pool: &'a BufferPool,
}

impl<'a> CatalogStore<'a> {
    pub fn new(buffer_pool: &'a BufferPool) -> Self {
        Self { buffer_pool }
    }

    /// Loads the catalog from `CATALOG_PAGE_ID`, or returns an empty one if
    /// the page has never been written (fresh database).
    pub fn load(&self) -> DbResult<Catalog> {
        let guard = self.buffer_pool.get_page(CATALOG_PAGE_ID)?;
        let len = guard.read_i32(0);
        if len <= 0 {
            return Ok(Catalog::default());
        }
        let bytes = guard.read_bytes(4, len as usize).to_vec();
        Ok(Catalog::decode_from(&mut Cursor::new(bytes)))
    }

    pub fn save(&self, catalog: &Catalog) -> DbResult<()> {
        let bytes = catalog.encode();
        if bytes.len() + 4 > PAGE_SIZE {
            return Err(DbError::CorruptPage {
                page_id: CATALOG_PAGE_ID,
                reason: "catalog blob exceeds one page".to_string(),
            });
        }
        let mut guard = self.buffer_pool.get_page(CATALOG_PAGE_ID)?;
        guard.write_i32(0, bytes.len() as i32);
        guard.write_bytes(4, &bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::Pager;
    use crate::schema::Column;
    use crate::types::ColumnType;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn pool() -> BufferPool {
        let tmp = NamedTempFile::new().unwrap();
        let pager = Arc::new(Pager::open(tmp.path()).unwrap());
        BufferPool::new(pager, 16)
    }

    #[test]
    fn create_and_drop_table() {
        let mut catalog = Catalog::default();
        catalog
            .create_table("t", TableSchema::new(vec![Column::new("id", ColumnType::Int).primary_key()]))
            .unwrap();
        assert!(catalog.table_schema("t").is_ok());
        assert!(matches!(
            catalog.create_table("t", TableSchema::default()),
            Err(DbError::TableExists(_))
        ));
        catalog.drop_table("t").unwrap();
        assert!(matches!(catalog.table_schema("t"), Err(DbError::TableNotFound(_))));
    }

    #[test]
    fn encode_decode_round_trip_preserves_tables_and_pages() {
        let mut catalog = Catalog::default();
        catalog
            .create_table("t", TableSchema::new(vec![Column::new("id", ColumnType::Int).primary_key()]))
            .unwrap();
        catalog.append_table_page("t", 5).unwrap();
        catalog.append_table_page("t", 6).unwrap();

        let bytes = catalog.encode();
        let decoded = Catalog::decode_from(&mut Cursor::new(bytes));
        assert_eq!(decoded.table_pages("t").unwrap(), &[5, 6]);
        assert_eq!(decoded.table_schema("t").unwrap(), catalog.table_schema("t").unwrap());
    }

    #[test]
    fn store_persists_across_reload() {
        let pool = pool();
        pool.new_page().unwrap(); // page 1 == CATALOG_PAGE_ID

        let mut catalog = Catalog::default();
        catalog
            .create_table("t", TableSchema::new(vec![Column::new("id", ColumnType::Int).primary_key()]))
            .unwrap();

        let store = CatalogStore::new(&pool);
        store.save(&catalog).unwrap();

        let reloaded = store.load().unwrap();
        assert!(reloaded.table_schema("t").is_ok());
    }

    #[test]
    fn load_on_fresh_page_is_empty() {
        let pool = pool();
        pool.new_page().unwrap();
        let store = CatalogStore::new(&pool);
        let catalog = store.load().unwrap();
        assert!(catalog.tables.is_empty());
    }
}
