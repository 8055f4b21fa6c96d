//! Statement execution: turns an `ast::Statement` into table/index/
//! transaction operations, enforcing constraints in order and returning an
//! `ExecResult` (the idiomatic replacement for the source's boolean-flag
//! result dictionary).

use crate::ast::{self, Assignment, ColumnDef, Statement};
use crate::buffer_pool::BufferPool;
use crate::catalog::{Catalog, TriggerEvent, TriggerTiming};
use crate::error::{DbError, DbResult};
use crate::index_registry::{IndexRegistry, NO_BACKING_INDEX};
use crate::record::Record;
use crate::schema::{Column, TableSchema};
use crate::table_manager::TableManager;
use crate::transaction::{IsolationLevel, LockTable, TransactionManager, TransactionRegistry};
use crate::types::{check_type, parse_default, ColumnType, Rid, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    CreateTable { message: String },
    DropTable { message: String },
    TruncateTable { message: String },
    AlterTable { message: String },
    CreateIndex { message: String },
    DropIndex { message: String },
    CreateView { message: String },
    DropView { message: String },
    CreateUser { message: String },
    DropUser { message: String },
    CreateTrigger { message: String },
    DropTrigger { message: String },
    Grant { message: String },
    Revoke { message: String },
    Insert { rows_inserted: usize, message: String },
    Select { data: Vec<Record>, rows_returned: usize, message: String },
    Update { rows_updated: usize, message: String },
    Delete { rows_deleted: usize, message: String },
    Begin { message: String },
    Commit { message: String },
    Rollback { message: String },
    SetAutocommit { message: String },
    SetIsolationLevel { message: String },
    ShowAutocommit { autocommit: bool, message: String },
    ShowIsolationLevel { level: IsolationLevel, message: String },
}

pub struct Executor<'a> {
    pub buffer_pool: &'a BufferPool,
    pub catalog: &'a mut Catalog,
    pub index_registry: &'a mut IndexRegistry,
    pub transaction_registry: &'a TransactionRegistry,
    pub lock_table: &'a LockTable,
    pub btree_order: usize,
    pub txn_manager: &'a mut TransactionManager,
    pub clock: u64,
}

fn parse_column_type(name: &str) -> DbResult<ColumnType> {
    match name.to_ascii_uppercase().as_str() {
        "TINYINT" => Ok(ColumnType::TinyInt),
        "INT" | "INTEGER" => Ok(ColumnType::Int),
        "BIGINT" => Ok(ColumnType::BigInt),
        "FLOAT" => Ok(ColumnType::Float),
        "BOOLEAN" | "BOOL" => Ok(ColumnType::Boolean),
        "VARCHAR" => Ok(ColumnType::Varchar),
        "CHAR" => Ok(ColumnType::Char),
        "DECIMAL" => Ok(ColumnType::Decimal),
        "DATE" => Ok(ColumnType::Date),
        "TIME" => Ok(ColumnType::Time),
        "DATETIME" => Ok(ColumnType::DateTime),
        other => Err(DbError::UnsupportedStatement(format!("unknown column type {}", other))),
    }
}

fn column_def_to_column(def: &ColumnDef) -> DbResult<Column> {
    Ok(Column {
        name: def.name.clone(),
        ty: parse_column_type(&def.type_name)?,
        max_length: def.max_length,
        precision: def.precision,
        scale: def.scale,
        nullable: def.nullable,
        primary_key: def.primary_key,
        unique: def.unique,
        default: def.default.clone(),
        check: def.check.clone().map(|predicate| crate::schema::CheckExpr { predicate }),
        foreign_key: def.foreign_key.as_ref().map(|(column, ref_table, ref_column)| crate::schema::ForeignKey {
            column: column.clone(),
            ref_table: ref_table.clone(),
            ref_column: ref_column.clone(),
        }),
    })
}

impl<'a> Executor<'a> {
    pub fn execute(&mut self, statement: Statement) -> DbResult<ExecResult> {
        match statement {
            Statement::CreateTable { table, columns, if_not_exists } => self.create_table(&table, columns, if_not_exists),
            Statement::DropTable { table, if_exists } => self.drop_table(&table, if_exists),
            Statement::TruncateTable { table } => self.truncate_table(&table),
            Statement::AlterTableAddColumn { table, column } => self.alter_add_column(&table, column),
            Statement::AlterTableDropColumn { table, column } => self.alter_drop_column(&table, &column),
            Statement::CreateIndex { name, table, column, unique, if_not_exists } => {
                self.create_index(&name, &table, &column, unique, if_not_exists)
            }
            Statement::DropIndex { name, if_exists } => self.drop_index(&name, if_exists),
            Statement::CreateView { name, query_text, if_not_exists } => self.create_view(&name, query_text, if_not_exists),
            Statement::DropView { name, if_exists } => self.drop_view(&name, if_exists),
            Statement::CreateUser { name, if_not_exists } => self.create_user(&name, if_not_exists),
            Statement::DropUser { name, if_exists } => self.drop_user(&name, if_exists),
            Statement::CreateTrigger { name, table, event, timing, body, if_not_exists } => {
                self.create_trigger(&name, &table, event, timing, body, if_not_exists)
            }
            Statement::DropTrigger { name, if_exists } => self.drop_trigger(&name, if_exists),
            Statement::Grant { user, privilege } => self.grant(&user, &privilege),
            Statement::Revoke { user, privilege } => self.revoke(&user, &privilege),
            Statement::Insert { table, columns, values } => self.insert(&table, columns, values),
            Statement::Select { table, columns, predicate } => self.select(&table, columns, predicate),
            Statement::Update { table, assignments, predicate } => self.update(&table, assignments, predicate),
            Statement::Delete { table, predicate } => self.delete(&table, predicate),
            Statement::Begin => self.begin(),
            Statement::Commit => self.commit(),
            Statement::Rollback => self.rollback(),
            Statement::SetAutocommit(enabled) => self.set_autocommit(enabled),
            Statement::SetIsolationLevel(level) => self.set_isolation_level(level),
            Statement::ShowAutocommit => Ok(ExecResult::ShowAutocommit {
                autocommit: self.txn_manager.autocommit,
                message: format!("autocommit = {}", self.txn_manager.autocommit),
            }),
            Statement::ShowIsolationLevel => Ok(ExecResult::ShowIsolationLevel {
                level: self.txn_manager.isolation_level,
                message: format!("isolation level = {:?}", self.txn_manager.isolation_level),
            }),
        }
    }

    fn create_table(&mut self, table: &str, columns: Vec<ColumnDef>, if_not_exists: bool) -> DbResult<ExecResult> {
        let schema = TableSchema::new(columns.iter().map(column_def_to_column).collect::<DbResult<Vec<_>>>()?);
        let table_manager = TableManager::new(self.buffer_pool);
        match table_manager.create_table(self.catalog, table, schema) {
            Ok(()) => Ok(ExecResult::CreateTable {
                message: format!("table {} created", table),
            }),
            Err(DbError::TableExists(_)) if if_not_exists => Ok(ExecResult::CreateTable {
                message: format!("table {} already exists, skipped", table),
            }),
            Err(e) => Err(e),
        }
    }

    fn drop_table(&mut self, table: &str, if_exists: bool) -> DbResult<ExecResult> {
        let table_manager = TableManager::new(self.buffer_pool);
        match table_manager.drop_table(self.catalog, table) {
            Ok(()) => Ok(ExecResult::DropTable {
                message: format!("table {} dropped", table),
            }),
            Err(DbError::TableNotFound(_)) if if_exists => Ok(ExecResult::DropTable {
                message: format!("table {} does not exist, skipped", table),
            }),
            Err(e) => Err(e),
        }
    }

    fn truncate_table(&mut self, table: &str) -> DbResult<ExecResult> {
        let table_manager = TableManager::new(self.buffer_pool);
        table_manager.truncate_table(self.catalog, table)?;

        let names: Vec<String> = self
            .index_registry
            .indexes_for_table(table)
            .into_iter()
            .map(|meta| meta.index_name.clone())
            .collect();
        for name in names {
            let new_root = self.buffer_pool.new_page()?.page_id();
            crate::btree::init_leaf_page(self.buffer_pool, new_root)?;
            self.index_registry.update_root(&name, new_root)?;
        }
        Ok(ExecResult::TruncateTable {
            message: format!("table {} truncated", table),
        })
    }

    fn alter_add_column(&mut self, table: &str, column: ColumnDef) -> DbResult<ExecResult> {
        let new_column = column_def_to_column(&column)?;
        self.catalog.table_schema_mut(table)?.add_column(new_column);
        Ok(ExecResult::AlterTable {
            message: format!("column {} added to {}", column.name, table),
        })
    }

    fn alter_drop_column(&mut self, table: &str, column: &str) -> DbResult<ExecResult> {
        self.catalog.table_schema_mut(table)?.drop_column(column);
        Ok(ExecResult::AlterTable {
            message: format!("column {} dropped from {}", column, table),
        })
    }

    fn create_index(&mut self, name: &str, table: &str, column: &str, unique: bool, if_not_exists: bool) -> DbResult<ExecResult> {
        let schema = self.catalog.table_schema(table)?.clone();
        let table_manager = TableManager::new(self.buffer_pool);
        match self.index_registry.create_index(self.buffer_pool, name, table, column, unique) {
            Ok(()) => {
                for record in table_manager.scan_table_with_locations(self.catalog, table)? {
                    let (page_id, slot, record) = record;
                    self.index_registry.insert_into_indexes(
                        self.buffer_pool,
                        self.btree_order,
                        &schema,
                        table,
                        &record,
                        crate::types::Rid::new(page_id, slot),
                    )?;
                }
                Ok(ExecResult::CreateIndex {
                    message: format!("index {} created", name),
                })
            }
            Err(DbError::TableExists(_)) if if_not_exists => Ok(ExecResult::CreateIndex {
                message: format!("index {} already exists, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn drop_index(&mut self, name: &str, if_exists: bool) -> DbResult<ExecResult> {
        match self.index_registry.drop_index(name) {
            Ok(()) => Ok(ExecResult::DropIndex {
                message: format!("index {} dropped", name),
            }),
            Err(DbError::TableNotFound(_)) if if_exists => Ok(ExecResult::DropIndex {
                message: format!("index {} does not exist, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn create_view(&mut self, name: &str, query_text: String, if_not_exists: bool) -> DbResult<ExecResult> {
        match self.catalog.create_view(name, query_text) {
            Ok(()) => Ok(ExecResult::CreateView {
                message: format!("view {} created", name),
            }),
            Err(DbError::TableExists(_)) if if_not_exists => Ok(ExecResult::CreateView {
                message: format!("view {} already exists, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn drop_view(&mut self, name: &str, if_exists: bool) -> DbResult<ExecResult> {
        match self.catalog.drop_view(name) {
            Ok(()) => Ok(ExecResult::DropView {
                message: format!("view {} dropped", name),
            }),
            Err(DbError::TableNotFound(_)) if if_exists => Ok(ExecResult::DropView {
                message: format!("view {} does not exist, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn create_user(&mut self, name: &str, if_not_exists: bool) -> DbResult<ExecResult> {
        match self.catalog.create_user(name) {
            Ok(()) => Ok(ExecResult::CreateUser {
                message: format!("user {} created", name),
            }),
            Err(DbError::TableExists(_)) if if_not_exists => Ok(ExecResult::CreateUser {
                message: format!("user {} already exists, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn drop_user(&mut self, name: &str, if_exists: bool) -> DbResult<ExecResult> {
        match self.catalog.drop_user(name) {
            Ok(()) => Ok(ExecResult::DropUser {
                message: format!("user {} dropped", name),
            }),
            Err(DbError::TableNotFound(_)) if if_exists => Ok(ExecResult::DropUser {
                message: format!("user {} does not exist, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn create_trigger(
        &mut self,
        name: &str,
        table: &str,
        event: TriggerEvent,
        timing: TriggerTiming,
        body: String,
        if_not_exists: bool,
    ) -> DbResult<ExecResult> {
        let trigger = crate::catalog::TriggerMeta {
            name: name.to_string(),
            table: table.to_string(),
            event,
            timing,
            body,
        };
        match self.catalog.create_trigger(trigger) {
            Ok(()) => Ok(ExecResult::CreateTrigger {
                message: format!("trigger {} created", name),
            }),
            Err(DbError::TableExists(_)) if if_not_exists => Ok(ExecResult::CreateTrigger {
                message: format!("trigger {} already exists, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn drop_trigger(&mut self, name: &str, if_exists: bool) -> DbResult<ExecResult> {
        match self.catalog.drop_trigger(name) {
            Ok(()) => Ok(ExecResult::DropTrigger {
                message: format!("trigger {} dropped", name),
            }),
            Err(DbError::TableNotFound(_)) if if_exists => Ok(ExecResult::DropTrigger {
                message: format!("trigger {} does not exist, skipped", name),
            }),
            Err(e) => Err(e),
        }
    }

    fn grant(&mut self, user: &str, privilege: &str) -> DbResult<ExecResult> {
        self.catalog.grant(user, privilege)?;
        Ok(ExecResult::Grant {
            message: format!("granted {} to {}", privilege, user),
        })
    }

    fn revoke(&mut self, user: &str, privilege: &str) -> DbResult<ExecResult> {
        self.catalog.revoke(user, privilege)?;
        Ok(ExecResult::Revoke {
            message: format!("revoked {} from {}", privilege, user),
        })
    }

    /// Fires every matching trigger's recursion guard. Trigger bodies
    /// themselves are not executed here — that is delegated to whatever
    /// drives this core — but runaway recursive firing is still caught.
    fn fire_triggers(&mut self, table: &str, event: TriggerEvent, timing: TriggerTiming) -> DbResult<()> {
        let names: Vec<String> = self
            .catalog
            .triggers_for(table, event, timing)
            .into_iter()
            .map(|t| t.name.clone())
            .collect();
        for name in &names {
            self.txn_manager.enter_trigger(name)?;
            self.txn_manager.exit_trigger(name);
        }
        Ok(())
    }

    /// Step 1 of SPEC_FULL.md's constraint order: type and NOT NULL. Runs
    /// before the unique-index probe; `DEFAULT` substitution already
    /// happened in `build_record`, so a declared default means a value
    /// never reaches this check as NULL.
    fn enforce_constraints(&self, schema: &TableSchema, record: &Record) -> DbResult<()> {
        for (i, column) in schema.columns.iter().enumerate() {
            let value = &record.values[i];
            check_type(value, &column.name, &column.ty)?;
            if value.is_null() && !column.nullable {
                return Err(DbError::NullInNotNull(column.name.clone()));
            }
        }
        Ok(())
    }

    /// Step 4: every column-level `CHECK` predicate, evaluated with the
    /// same 3-valued-logic evaluator the executor uses for `WHERE`.
    fn enforce_checks(&self, schema: &TableSchema, record: &Record) -> DbResult<()> {
        for check in schema.check_exprs() {
            if !ast::eval(&check.predicate, schema, record) {
                return Err(DbError::CheckViolation(format!("{:?}", check.predicate)));
            }
        }
        Ok(())
    }

    /// For every `FOREIGN KEY (col) REFERENCES ref_table(ref_col)` with a
    /// non-null value, scans `ref_table` for a matching row — the same
    /// table-scan fallback shape `enforce_unique_indexes` uses for a
    /// non-backed unique column, just checking for presence instead of
    /// absence.
    fn enforce_foreign_keys(&self, schema: &TableSchema, record: &Record) -> DbResult<()> {
        let table_manager = TableManager::new(self.buffer_pool);
        for fk in schema.foreign_keys() {
            let col_idx = match schema.column_index(&fk.column) {
                Some(i) => i,
                None => continue,
            };
            let value = &record.values[col_idx];
            if value.is_null() {
                continue;
            }

            let ref_schema = self.catalog.table_schema(&fk.ref_table)?;
            let ref_col_idx = ref_schema
                .column_index(&fk.ref_column)
                .ok_or_else(|| DbError::ColumnNotFound(fk.ref_column.clone()))?;

            let found = table_manager
                .scan_table(self.catalog, &fk.ref_table)?
                .iter()
                .any(|r| &r.values[ref_col_idx] == value);
            if !found {
                return Err(DbError::ForeignKeyViolation(format!(
                    "{} references {}.{} = {}, no such row exists",
                    fk.column, fk.ref_table, fk.ref_column, value
                )));
            }
        }
        Ok(())
    }

    /// Probes every unique index (real or synthesized) for a conflicting
    /// key before any physical write happens. A synthesized entry with no
    /// backing tree still has to be enforced for non-PK UNIQUE columns — a
    /// plain `UNIQUE` column with no `CREATE INDEX` run against it has
    /// nothing else guarding it, so this falls back to a table scan; PK
    /// columns are skipped here since `TableManager` already scans for
    /// primary-key collisions before every insert. `exclude` is the row
    /// being updated itself (UPDATE re-probes every unique column even
    /// when its value didn't change, so the row must not conflict with
    /// its own prior version).
    fn enforce_unique_indexes(&self, schema: &TableSchema, table: &str, record: &Record, exclude: Option<Rid>) -> DbResult<()> {
        for meta in self.index_registry.get_unique_indexes_for_table(table, schema) {
            let col_idx = match schema.column_index(&meta.column_name) {
                Some(i) => i,
                None => continue,
            };
            let value = &record.values[col_idx];
            if value.is_null() {
                continue;
            }

            if meta.root_page_id == NO_BACKING_INDEX {
                if schema.columns[col_idx].primary_key {
                    continue;
                }
                let table_manager = TableManager::new(self.buffer_pool);
                let conflict = table_manager
                    .scan_table_with_locations(self.catalog, table)?
                    .into_iter()
                    .any(|(page_id, slot, r)| {
                        if exclude == Some(Rid::new(page_id, slot)) {
                            return false;
                        }
                        &r.values[col_idx] == value
                    });
                if conflict {
                    return Err(DbError::UniqueViolation {
                        index: meta.index_name.clone(),
                        key: value.to_string(),
                    });
                }
                continue;
            }

            let tree = crate::btree::BPlusTree::new(self.buffer_pool, self.btree_order, meta.root_page_id);
            if let Some(found) = tree.search(value)? {
                if Some(found) != exclude {
                    return Err(DbError::UniqueViolation {
                        index: meta.index_name.clone(),
                        key: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, table: &str, columns: Option<Vec<String>>, values: Vec<Value>) -> DbResult<ExecResult> {
        let schema = self.catalog.table_schema(table)?.clone();
        let record = self.build_record(&schema, columns, values)?;

        self.enforce_constraints(&schema, &record)?;
        self.enforce_unique_indexes(&schema, table, &record, None)?;
        self.enforce_checks(&schema, &record)?;
        self.enforce_foreign_keys(&schema, &record)?;
        self.fire_triggers(table, TriggerEvent::Insert, TriggerTiming::Before)?;

        if self.txn_manager.isolation_level == IsolationLevel::Serializable {
            self.lock_table.acquire_exclusive(table, self.txn_manager.session_id)?;
        }

        let table_manager = TableManager::new(self.buffer_pool);
        let rid = table_manager.insert_record(self.catalog, &schema, table, &record)?;
        self.index_registry
            .insert_into_indexes(self.buffer_pool, self.btree_order, &schema, table, &record, rid)?;

        if self.txn_manager.in_transaction() {
            self.txn_manager
                .record_insert(self.transaction_registry, table, record, rid, self.clock)?;
        }

        self.fire_triggers(table, TriggerEvent::Insert, TriggerTiming::After)?;
        Ok(ExecResult::Insert {
            rows_inserted: 1,
            message: format!("1 row inserted into {}", table),
        })
    }

    fn build_record(&self, schema: &TableSchema, columns: Option<Vec<String>>, values: Vec<Value>) -> DbResult<Record> {
        match columns {
            None => {
                if values.len() != schema.columns.len() {
                    return Err(DbError::UnsupportedStatement(
                        "value count does not match column count".to_string(),
                    ));
                }
                Ok(Record::new(values))
            }
            Some(names) => {
                let mut slots = vec![Value::Null; schema.columns.len()];
                for (name, value) in names.iter().zip(values.into_iter()) {
                    let idx = schema
                        .column_index(name)
                        .ok_or_else(|| DbError::ColumnNotFound(name.clone()))?;
                    slots[idx] = value;
                }
                for (idx, column) in schema.columns.iter().enumerate() {
                    if names.iter().any(|n| n == &column.name) {
                        continue;
                    }
                    if let Some(default_text) = &column.default {
                        slots[idx] = parse_default(default_text, &column.name, &column.ty)?;
                    }
                }
                Ok(Record::new(slots))
            }
        }
    }

    fn select(&mut self, table: &str, columns: Option<Vec<String>>, predicate: Option<ast::Predicate>) -> DbResult<ExecResult> {
        let schema = self.catalog.table_schema(table)?.clone();

        if self.txn_manager.isolation_level == IsolationLevel::Serializable {
            self.lock_table.acquire_shared(table, self.txn_manager.session_id)?;
        }

        let table_manager = TableManager::new(self.buffer_pool);
        let raw_rows = table_manager.scan_table(self.catalog, table)?;
        let visible = self.txn_manager.visible_rows(self.transaction_registry, table, &schema, raw_rows);

        let filtered: Vec<Record> = match &predicate {
            Some(expr) => visible.into_iter().filter(|r| ast::eval(expr, &schema, r)).collect(),
            None => visible,
        };

        let projected = match columns {
            None => filtered,
            Some(names) => filtered
                .into_iter()
                .map(|r| {
                    let values = names
                        .iter()
                        .map(|name| schema.column_index(name).map(|i| r.values[i].clone()).unwrap_or(Value::Null))
                        .collect();
                    Record::new(values)
                })
                .collect(),
        };

        let count = projected.len();
        Ok(ExecResult::Select {
            data: projected,
            rows_returned: count,
            message: format!("{} row(s) returned", count),
        })
    }

    fn update(&mut self, table: &str, assignments: Vec<Assignment>, predicate: Option<ast::Predicate>) -> DbResult<ExecResult> {
        let schema = self.catalog.table_schema(table)?.clone();

        if self.txn_manager.isolation_level == IsolationLevel::Serializable {
            self.lock_table.acquire_exclusive(table, self.txn_manager.session_id)?;
        }

        self.fire_triggers(table, TriggerEvent::Update, TriggerTiming::Before)?;

        let table_manager = TableManager::new(self.buffer_pool);
        let rows = table_manager.scan_table_with_locations(self.catalog, table)?;

        let mut updated = 0usize;
        for (page_id, slot, old_record) in rows {
            if let Some(expr) = &predicate {
                if !ast::eval(expr, &schema, &old_record) {
                    continue;
                }
            }

            let mut new_record = old_record.clone();
            for assignment in &assignments {
                let idx = schema
                    .column_index(&assignment.column)
                    .ok_or_else(|| DbError::ColumnNotFound(assignment.column.clone()))?;
                new_record.values[idx] = ast::eval_value(&assignment.value, &schema, &old_record);
            }
            self.enforce_constraints(&schema, &new_record)?;
            self.enforce_unique_indexes(&schema, table, &new_record, Some(Rid::new(page_id, slot)))?;
            self.enforce_checks(&schema, &new_record)?;
            self.enforce_foreign_keys(&schema, &new_record)?;

            let rid = table_manager.update_at(self.catalog, table, page_id, slot, &new_record)?;
            if self.txn_manager.in_transaction() {
                self.txn_manager.record_update(
                    self.transaction_registry,
                    table,
                    old_record.clone(),
                    new_record.clone(),
                    rid,
                    self.clock,
                )?;
            }
            updated += 1;
        }

        self.fire_triggers(table, TriggerEvent::Update, TriggerTiming::After)?;
        Ok(ExecResult::Update {
            rows_updated: updated,
            message: format!("{} row(s) updated", updated),
        })
    }

    fn delete(&mut self, table: &str, predicate: Option<ast::Predicate>) -> DbResult<ExecResult> {
        let schema = self.catalog.table_schema(table)?.clone();

        if self.txn_manager.isolation_level == IsolationLevel::Serializable {
            self.lock_table.acquire_exclusive(table, self.txn_manager.session_id)?;
        }

        self.fire_triggers(table, TriggerEvent::Delete, TriggerTiming::Before)?;

        let table_manager = TableManager::new(self.buffer_pool);
        let rows = table_manager.scan_table_with_locations(self.catalog, table)?;

        let mut deleted = 0usize;
        for (page_id, slot, record) in rows {
            if let Some(expr) = &predicate {
                if !ast::eval(expr, &schema, &record) {
                    continue;
                }
            }
            table_manager.delete_at(page_id, slot)?;
            if self.txn_manager.in_transaction() {
                self.txn_manager
                    .record_delete(self.transaction_registry, table, record.clone(), self.clock)?;
            }
            deleted += 1;
        }

        self.fire_triggers(table, TriggerEvent::Delete, TriggerTiming::After)?;
        Ok(ExecResult::Delete {
            rows_deleted: deleted,
            message: format!("{} row(s) deleted", deleted),
        })
    }

    fn begin(&mut self) -> DbResult<ExecResult> {
        self.txn_manager.begin(self.transaction_registry)?;
        Ok(ExecResult::Begin {
            message: "transaction started".to_string(),
        })
    }

    fn commit(&mut self) -> DbResult<ExecResult> {
        self.txn_manager.commit(self.transaction_registry, self.lock_table)?;
        Ok(ExecResult::Commit {
            message: "transaction committed".to_string(),
        })
    }

    fn rollback(&mut self) -> DbResult<ExecResult> {
        self.txn_manager
            .rollback(self.transaction_registry, self.lock_table, self.buffer_pool, self.catalog)?;
        Ok(ExecResult::Rollback {
            message: "transaction rolled back".to_string(),
        })
    }

    fn set_autocommit(&mut self, enabled: bool) -> DbResult<ExecResult> {
        self.txn_manager.set_autocommit(enabled, self.transaction_registry, self.lock_table)?;
        Ok(ExecResult::SetAutocommit {
            message: format!("autocommit set to {}", enabled),
        })
    }

    fn set_isolation_level(&mut self, level: IsolationLevel) -> DbResult<ExecResult> {
        self.txn_manager.set_isolation_level(level)?;
        Ok(ExecResult::SetIsolationLevel {
            message: format!("isolation level set to {:?}", level),
        })
    }
}
