//! Owns every shared piece of server state: the buffer pool, catalog,
//! index registry, transaction registry and lock table. Sessions borrow
//! the engine for the duration of each statement; nothing here is a
//! process-global — callers construct an `Engine` and hand it (or an
//! `Arc<Engine>`) to however many sessions they need.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::info;

use crate::ast::Statement;
use crate::buffer_pool::BufferPool;
use crate::catalog::{Catalog, CatalogStore, CATALOG_PAGE_ID};
use crate::config::EngineConfig;
use crate::error::DbResult;
use crate::executor::{ExecResult, Executor};
use crate::index_registry::{IndexRegistry, IndexRegistryStore, INDEX_REGISTRY_PAGE_ID};
use crate::pager::Pager;
use crate::transaction::{LockTable, SessionId, TransactionManager, TransactionRegistry};

pub struct Session {
    pub session_id: SessionId,
    pub txn_manager: TransactionManager,
}

pub struct Engine {
    config: EngineConfig,
    buffer_pool: BufferPool,
    catalog: Mutex<Catalog>,
    index_registry: Mutex<IndexRegistry>,
    transaction_registry: TransactionRegistry,
    lock_table: LockTable,
    next_session_id: AtomicU64,
    clock: AtomicU64,
}

impl Engine {
    pub fn open(config: EngineConfig) -> DbResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let pager = Pager::open(config.db_file_path())?;
        let buffer_pool = BufferPool::new(Arc::new(pager), config.buffer_pool_capacity);

        if buffer_pool.new_page()?.page_id() != CATALOG_PAGE_ID {
            unreachable!("a fresh database file's first page must be the catalog page");
        }
        if buffer_pool.new_page()?.page_id() != INDEX_REGISTRY_PAGE_ID {
            unreachable!("a fresh database file's second page must be the index registry page");
        }

        let catalog = CatalogStore::new(&buffer_pool).load()?;
        let index_registry = IndexRegistryStore::new(&buffer_pool).load()?;
        info!("engine opened at {}", config.db_file_path().display());

        Ok(Self {
            config,
            buffer_pool,
            catalog: Mutex::new(catalog),
            index_registry: Mutex::new(index_registry),
            transaction_registry: TransactionRegistry::new(),
            lock_table: LockTable::new(),
            next_session_id: AtomicU64::new(1),
            clock: AtomicU64::new(1),
        })
    }

    pub fn new_session(&self) -> Session {
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        Session {
            session_id,
            txn_manager: TransactionManager::new(session_id, self.config.default_isolation),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    pub fn execute(&self, session: &mut Session, statement: Statement) -> DbResult<ExecResult> {
        let mut catalog = self.catalog.lock().unwrap();
        let mut index_registry = self.index_registry.lock().unwrap();
        let clock = self.tick();

        let mut executor = Executor {
            buffer_pool: &self.buffer_pool,
            catalog: &mut catalog,
            index_registry: &mut index_registry,
            transaction_registry: &self.transaction_registry,
            lock_table: &self.lock_table,
            btree_order: self.config.btree_order,
            txn_manager: &mut session.txn_manager,
            clock,
        };
        let result = executor.execute(statement);

        CatalogStore::new(&self.buffer_pool).save(&catalog)?;
        IndexRegistryStore::new(&self.buffer_pool).save(&index_registry)?;
        result
    }

    pub fn flush(&self) -> DbResult<()> {
        self.buffer_pool.flush_all()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ColumnDef;
    use tempfile::TempDir;

    fn int_column(name: &str, primary_key: bool) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            type_name: "INT".to_string(),
            max_length: None,
            precision: None,
            scale: None,
            nullable: !primary_key,
            primary_key,
            unique: false,
            default: None,
            check: None,
            foreign_key: None,
        }
    }

    #[test]
    fn open_initializes_catalog_and_index_registry_pages() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::open(EngineConfig::new(dir.path())).unwrap();
        let mut session = engine.new_session();

        let result = engine
            .execute(
                &mut session,
                Statement::CreateTable {
                    table: "t".to_string(),
                    columns: vec![int_column("id", true)],
                    if_not_exists: false,
                },
            )
            .unwrap();
        assert!(matches!(result, ExecResult::CreateTable { .. }));
    }

    #[test]
    fn engine_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let engine = Engine::open(EngineConfig::new(dir.path())).unwrap();
            let mut session = engine.new_session();
            engine
                .execute(
                    &mut session,
                    Statement::CreateTable {
                        table: "t".to_string(),
                        columns: vec![int_column("id", true)],
                        if_not_exists: false,
                    },
                )
                .unwrap();
        }

        let engine = Engine::open(EngineConfig::new(dir.path())).unwrap();
        let mut session = engine.new_session();
        let result = engine
            .execute(
                &mut session,
                Statement::Insert {
                    table: "t".to_string(),
                    columns: None,
                    values: vec![crate::types::Value::Int(1)],
                },
            )
            .unwrap();
        assert!(matches!(result, ExecResult::Insert { rows_inserted: 1, .. }));
    }
}
