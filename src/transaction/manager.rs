//! Per-session transaction manager: autocommit/isolation state, and the
//! visibility algorithm that reconciles a raw table scan against every
//! other active session's in-flight pending changes.

use std::collections::HashMap;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::record::Record;
use crate::schema::TableSchema;
use crate::table_manager::TableManager;
use crate::transaction::lock_table::LockTable;
use crate::transaction::registry::TransactionRegistry;
use crate::transaction::txn::{ChangeKind, IsolationLevel, PendingChange, SessionId, TxnId, TxnState, UndoEntry};
use crate::types::Rid;

fn isolation_rank(level: IsolationLevel) -> u8 {
    match level {
        IsolationLevel::ReadUncommitted => 0,
        IsolationLevel::ReadCommitted => 1,
        IsolationLevel::RepeatableRead => 2,
        IsolationLevel::Serializable => 3,
    }
}

pub struct TransactionManager {
    pub session_id: SessionId,
    pub autocommit: bool,
    pub isolation_level: IsolationLevel,
    current_txn_id: Option<TxnId>,
    rr_snapshot: HashMap<String, Vec<Record>>,
    trigger_stack: Vec<String>,
}

impl TransactionManager {
    pub fn new(session_id: SessionId, default_isolation: IsolationLevel) -> Self {
        Self {
            session_id,
            autocommit: true,
            isolation_level: default_isolation,
            current_txn_id: None,
            rr_snapshot: HashMap::new(),
            trigger_stack: Vec::new(),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.current_txn_id.is_some()
    }

    pub fn current_txn_id(&self) -> Option<TxnId> {
        self.current_txn_id
    }

    pub fn begin(&mut self, registry: &TransactionRegistry) -> DbResult<TxnId> {
        if self.current_txn_id.is_some() {
            return Err(DbError::TransactionStateError("already in a transaction".to_string()));
        }
        let txn_id = registry.next_txn_id();
        registry.register(TxnState::new(txn_id, self.session_id, self.isolation_level, txn_id));
        self.current_txn_id = Some(txn_id);
        self.rr_snapshot.clear();
        self.autocommit = false;
        Ok(txn_id)
    }

    pub fn commit(&mut self, registry: &TransactionRegistry, lock_table: &LockTable) -> DbResult<()> {
        let txn_id = self
            .current_txn_id
            .take()
            .ok_or_else(|| DbError::TransactionStateError("commit outside a transaction".to_string()))?;
        registry.unregister(txn_id);
        lock_table.release_all_for_session(self.session_id);
        self.rr_snapshot.clear();
        self.autocommit = true;
        Ok(())
    }

    /// Replays the undo log in reverse, physically compensating every
    /// write this transaction made.
    pub fn rollback(
        &mut self,
        registry: &TransactionRegistry,
        lock_table: &LockTable,
        buffer_pool: &BufferPool,
        catalog: &mut Catalog,
    ) -> DbResult<()> {
        let txn_id = self
            .current_txn_id
            .take()
            .ok_or_else(|| DbError::TransactionStateError("rollback outside a transaction".to_string()))?;
        let txn = registry
            .unregister(txn_id)
            .ok_or_else(|| DbError::TransactionStateError("transaction vanished from registry".to_string()))?;

        let table_manager = TableManager::new(buffer_pool);
        for entry in txn.undo_log.into_iter().rev() {
            match entry {
                UndoEntry::Insert { rid, .. } => {
                    table_manager.delete_at(rid.page_id, rid.slot)?;
                }
                UndoEntry::Update { table, rid, old_data } => {
                    table_manager.update_at(catalog, &table, rid.page_id, rid.slot, &old_data)?;
                }
                UndoEntry::Delete { table, old_data } => {
                    let schema = catalog.table_schema(&table)?.clone();
                    table_manager.insert_record(catalog, &schema, &table, &old_data)?;
                }
            }
        }

        lock_table.release_all_for_session(self.session_id);
        self.rr_snapshot.clear();
        self.autocommit = true;
        Ok(())
    }

    pub fn set_autocommit(&mut self, enabled: bool, registry: &TransactionRegistry, lock_table: &LockTable) -> DbResult<()> {
        if enabled && self.current_txn_id.is_some() {
            self.commit(registry, lock_table)?;
        }
        self.autocommit = enabled;
        Ok(())
    }

    pub fn set_isolation_level(&mut self, level: IsolationLevel) -> DbResult<()> {
        if self.current_txn_id.is_some() {
            return Err(DbError::TransactionStateError(
                "cannot change isolation level inside an active transaction".to_string(),
            ));
        }
        self.isolation_level = level;
        Ok(())
    }

    fn require_active_txn(&self) -> DbResult<TxnId> {
        self.current_txn_id
            .ok_or_else(|| DbError::TransactionStateError("no active transaction".to_string()))
    }

    pub fn record_insert(&mut self, registry: &TransactionRegistry, table: &str, new_data: Record, rid: Rid, clock: u64) -> DbResult<()> {
        let txn_id = self.require_active_txn()?;
        registry.with_txn_mut(txn_id, |txn| {
            txn.record_change(
                table,
                PendingChange {
                    kind: ChangeKind::Insert,
                    old_data: None,
                    new_data: Some(new_data),
                    timestamp: clock,
                },
            );
            txn.push_undo(UndoEntry::Insert { table: table.to_string(), rid });
        });
        Ok(())
    }

    pub fn record_update(
        &mut self,
        registry: &TransactionRegistry,
        table: &str,
        old_data: Record,
        new_data: Record,
        rid: Rid,
        clock: u64,
    ) -> DbResult<()> {
        let txn_id = self.require_active_txn()?;
        registry.with_txn_mut(txn_id, |txn| {
            txn.record_change(
                table,
                PendingChange {
                    kind: ChangeKind::Update,
                    old_data: Some(old_data.clone()),
                    new_data: Some(new_data),
                    timestamp: clock,
                },
            );
            txn.push_undo(UndoEntry::Update {
                table: table.to_string(),
                rid,
                old_data,
            });
        });
        Ok(())
    }

    pub fn record_delete(&mut self, registry: &TransactionRegistry, table: &str, old_data: Record, clock: u64) -> DbResult<()> {
        let txn_id = self.require_active_txn()?;
        registry.with_txn_mut(txn_id, |txn| {
            txn.record_change(
                table,
                PendingChange {
                    kind: ChangeKind::Delete,
                    old_data: Some(old_data.clone()),
                    new_data: None,
                    timestamp: clock,
                },
            );
            txn.push_undo(UndoEntry::Delete {
                table: table.to_string(),
                old_data,
            });
        });
        Ok(())
    }

    /// Computes what this session sees when scanning `table`, given the
    /// raw (already heap-mutated) rows and the set of other sessions'
    /// active transactions. Freezes and reuses a snapshot for
    /// `REPEATABLE READ` and `SERIALIZABLE`.
    pub fn visible_rows(
        &mut self,
        registry: &TransactionRegistry,
        table: &str,
        schema: &TableSchema,
        raw_rows: Vec<Record>,
    ) -> Vec<Record> {
        let freezes_snapshot = isolation_rank(self.isolation_level) >= isolation_rank(IsolationLevel::RepeatableRead);

        if freezes_snapshot && self.current_txn_id.is_some() {
            if let Some(snapshot) = self.rr_snapshot.get(table) {
                return snapshot.clone();
            }
        }

        let mut visible = raw_rows;
        let others = match self.current_txn_id {
            Some(txn_id) => registry.other_active(txn_id),
            None => registry.other_active(u64::MAX),
        };

        if isolation_rank(self.isolation_level) > isolation_rank(IsolationLevel::ReadUncommitted) {
            for other in &others {
                if let Some(changes) = other.pending_changes.get(table) {
                    for change in changes {
                        undo_pending_change(&mut visible, schema, change);
                    }
                }
            }
        }

        if let Some(txn_id) = self.current_txn_id {
            if let Some(own) = registry.get(txn_id) {
                if let Some(changes) = own.pending_changes.get(table) {
                    for change in changes {
                        apply_self_change(&mut visible, schema, change);
                    }
                }
            }
        }

        if freezes_snapshot && self.current_txn_id.is_some() {
            self.rr_snapshot.insert(table.to_string(), visible.clone());
        }

        visible
    }

    /// Guards against unbounded trigger recursion; the trigger body itself
    /// is executed by the caller (out of scope for this core), this only
    /// tracks the currently-firing trigger stack.
    pub fn enter_trigger(&mut self, trigger_name: &str) -> DbResult<()> {
        if self.trigger_stack.iter().any(|t| t == trigger_name) {
            return Err(DbError::TriggerRecursion {
                trigger: trigger_name.to_string(),
            });
        }
        self.trigger_stack.push(trigger_name.to_string());
        Ok(())
    }

    pub fn exit_trigger(&mut self, trigger_name: &str) {
        self.trigger_stack.retain(|t| t != trigger_name);
    }
}

/// Reverses the effect of another session's uncommitted write on the raw
/// (eagerly physically mutated) scan, so a reader whose isolation level
/// hides dirty writes sees the pre-write state rather than either the
/// dirty value or a hole where the row used to be.
fn undo_pending_change(visible: &mut Vec<Record>, schema: &TableSchema, change: &PendingChange) {
    match change.kind {
        ChangeKind::Insert => {
            if let Some(new_data) = &change.new_data {
                visible.retain(|r| r != new_data);
            }
        }
        ChangeKind::Update => {
            if let (Some(old_data), Some(new_data)) = (&change.old_data, &change.new_data) {
                if let Some(pos) = visible.iter().position(|r| r == new_data) {
                    visible[pos] = old_data.clone();
                } else if !visible.iter().any(|r| r.same_identity(old_data, schema)) {
                    visible.push(old_data.clone());
                }
            }
        }
        ChangeKind::Delete => {
            if let Some(old_data) = &change.old_data {
                if !visible.iter().any(|r| r.same_identity(old_data, schema)) {
                    visible.push(old_data.clone());
                }
            }
        }
    }
}

fn apply_self_change(visible: &mut Vec<Record>, schema: &TableSchema, change: &PendingChange) {
    match change.kind {
        ChangeKind::Insert => {
            if let Some(new_data) = &change.new_data {
                if !visible.iter().any(|r| r == new_data) {
                    visible.push(new_data.clone());
                }
            }
        }
        ChangeKind::Update => {
            if let (Some(old_data), Some(new_data)) = (&change.old_data, &change.new_data) {
                if let Some(pos) = visible.iter().position(|r| r.same_identity(old_data, schema)) {
                    visible[pos] = new_data.clone();
                } else {
                    visible.push(new_data.clone());
                }
            }
        }
        ChangeKind::Delete => {
            if let Some(old_data) = &change.old_data {
                visible.retain(|r| !r.same_identity(old_data, schema));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use crate::types::{ColumnType, Value};

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            Column::new("id", ColumnType::Int).primary_key(),
            Column::new("name", ColumnType::Varchar),
        ])
    }

    fn rec(id: i32, name: &str) -> Record {
        Record::new(vec![Value::Int(id), Value::Varchar(name.to_string())])
    }

    #[test]
    fn read_uncommitted_sees_others_dirty_writes() {
        let registry = TransactionRegistry::new();
        let lock_table = LockTable::new();

        let mut writer = TransactionManager::new(1, IsolationLevel::ReadCommitted);
        writer.begin(&registry).unwrap();
        writer
            .record_insert(&registry, "t", rec(1, "dirty"), Rid::new(5, 0), 1)
            .unwrap();

        let mut reader = TransactionManager::new(2, IsolationLevel::ReadUncommitted);
        let raw = vec![rec(1, "dirty")]; // heap already eagerly mutated by the writer
        let visible = reader.visible_rows(&registry, "t", &schema(), raw);
        assert_eq!(visible, vec![rec(1, "dirty")]);

        writer.commit(&registry, &lock_table).unwrap();
    }

    #[test]
    fn read_committed_hides_others_dirty_writes() {
        let registry = TransactionRegistry::new();
        let lock_table = LockTable::new();

        let mut writer = TransactionManager::new(1, IsolationLevel::ReadCommitted);
        writer.begin(&registry).unwrap();
        writer
            .record_insert(&registry, "t", rec(1, "dirty"), Rid::new(5, 0), 1)
            .unwrap();

        let mut reader = TransactionManager::new(2, IsolationLevel::ReadCommitted);
        let raw = vec![rec(1, "dirty")];
        let visible = reader.visible_rows(&registry, "t", &schema(), raw);
        assert!(visible.is_empty());

        writer.commit(&registry, &lock_table).unwrap();
    }

    #[test]
    fn writer_always_sees_its_own_writes() {
        let registry = TransactionRegistry::new();
        let mut writer = TransactionManager::new(1, IsolationLevel::ReadCommitted);
        writer.begin(&registry).unwrap();
        writer
            .record_insert(&registry, "t", rec(1, "mine"), Rid::new(5, 0), 1)
            .unwrap();

        let visible = writer.visible_rows(&registry, "t", &schema(), vec![rec(1, "mine")]);
        assert_eq!(visible, vec![rec(1, "mine")]);
    }

    #[test]
    fn repeatable_read_freezes_snapshot_across_reads() {
        let registry = TransactionRegistry::new();
        let mut reader = TransactionManager::new(1, IsolationLevel::RepeatableRead);
        reader.begin(&registry).unwrap();

        let first = reader.visible_rows(&registry, "t", &schema(), vec![rec(1, "A")]);
        assert_eq!(first, vec![rec(1, "A")]);

        // even if the underlying table changes, the snapshot is reused.
        let second = reader.visible_rows(&registry, "t", &schema(), vec![rec(1, "A"), rec(2, "B")]);
        assert_eq!(second, vec![rec(1, "A")]);
    }

    #[test]
    fn enter_trigger_rejects_recursion() {
        let mut mgr = TransactionManager::new(1, IsolationLevel::ReadCommitted);
        mgr.enter_trigger("t1").unwrap();
        assert!(matches!(mgr.enter_trigger("t1"), Err(DbError::TriggerRecursion { .. })));
        mgr.exit_trigger("t1");
        mgr.enter_trigger("t1").unwrap();
    }
}
