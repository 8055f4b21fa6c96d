//! Per-transaction state: the pending-change bookkeeping used for
//! visibility filtering, and the undo log used to physically compensate a
//! rollback.

use std::collections::HashMap;

use crate::record::Record;
use crate::types::Rid;

pub type TxnId = u64;
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Picks the engine-wide default isolation level from whichever
/// `read_uncommitted`/`read_committed`/`repeatable_read`/`serializable`
/// feature is enabled; `EngineConfig::new` uses this, but any session can
/// still override it at runtime with `SET SESSION TRANSACTION ISOLATION
/// LEVEL`. The feature gate only changes the out-of-the-box default.
impl Default for IsolationLevel {
    fn default() -> Self {
        if cfg!(feature = "serializable") {
            IsolationLevel::Serializable
        } else if cfg!(feature = "repeatable_read") {
            IsolationLevel::RepeatableRead
        } else if cfg!(feature = "read_uncommitted") {
            IsolationLevel::ReadUncommitted
        } else {
            IsolationLevel::ReadCommitted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One entry in a table's pending-change list. `old_data`/`new_data`
/// follow `ChangeKind`: INSERT has only `new_data`, DELETE has only
/// `old_data`, UPDATE has both.
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub kind: ChangeKind,
    pub old_data: Option<Record>,
    pub new_data: Option<Record>,
    pub timestamp: u64,
}

/// A compensating action, applied in reverse order during rollback.
#[derive(Debug, Clone)]
pub enum UndoEntry {
    /// Undo an INSERT: delete the physical record.
    Insert { table: String, rid: Rid },
    /// Undo an UPDATE: rewrite the slot with the pre-image.
    Update { table: String, rid: Rid, old_data: Record },
    /// Undo a DELETE: re-insert the pre-image (possibly at a new rid).
    Delete { table: String, old_data: Record },
}

#[derive(Debug, Clone)]
pub struct TxnState {
    pub txn_id: TxnId,
    pub session_id: SessionId,
    pub isolation_level: IsolationLevel,
    /// Logical clock value assigned at `BEGIN`, used only to order
    /// transactions relative to each other (no wall-clock dependency).
    pub start_time: u64,
    pub modified_tables: Vec<String>,
    pub pending_changes: HashMap<String, Vec<PendingChange>>,
    pub undo_log: Vec<UndoEntry>,
    pub committed: bool,
}

impl TxnState {
    pub fn new(txn_id: TxnId, session_id: SessionId, isolation_level: IsolationLevel, start_time: u64) -> Self {
        Self {
            txn_id,
            session_id,
            isolation_level,
            start_time,
            modified_tables: Vec::new(),
            pending_changes: HashMap::new(),
            undo_log: Vec::new(),
            committed: false,
        }
    }

    pub fn record_change(&mut self, table: &str, change: PendingChange) {
        if !self.modified_tables.iter().any(|t| t == table) {
            self.modified_tables.push(table.to_string());
        }
        self.pending_changes.entry(table.to_string()).or_default().push(change);
    }

    pub fn push_undo(&mut self, entry: UndoEntry) {
        self.undo_log.push(entry);
    }
}
