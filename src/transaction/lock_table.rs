//! Process-wide table-level lock table. Only active under `SERIALIZABLE`
//! (§4.9): no blocking and no deadlock detection, conflicts are reported
//! immediately as `LockConflict` errors.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{DbError, DbResult};
use crate::transaction::txn::SessionId;

#[derive(Debug, Default)]
struct TableLocks {
    shared: HashSet<SessionId>,
    exclusive: Option<SessionId>,
}

#[derive(Default)]
pub struct LockTable {
    tables: Mutex<HashMap<String, TableLocks>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_shared(&self, table: &str, session: SessionId) -> DbResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table.to_string()).or_default();
        if let Some(holder) = entry.exclusive {
            if holder != session {
                return Err(DbError::LockConflict { table: table.to_string() });
            }
        }
        entry.shared.insert(session);
        Ok(())
    }

    pub fn acquire_exclusive(&self, table: &str, session: SessionId) -> DbResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table.to_string()).or_default();
        if let Some(holder) = entry.exclusive {
            if holder != session {
                return Err(DbError::LockConflict { table: table.to_string() });
            }
        }
        let other_readers = entry.shared.iter().any(|&s| s != session);
        if other_readers {
            return Err(DbError::LockConflict { table: table.to_string() });
        }
        entry.exclusive = Some(session);
        Ok(())
    }

    pub fn release_all_for_session(&self, session: SessionId) {
        let mut tables = self.tables.lock().unwrap();
        for locks in tables.values_mut() {
            locks.shared.remove(&session);
            if locks.exclusive == Some(session) {
                locks.exclusive = None;
            }
        }
        tables.retain(|_, locks| !locks.shared.is_empty() || locks.exclusive.is_some());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_from_different_sessions_coexist() {
        let locks = LockTable::new();
        locks.acquire_shared("t", 1).unwrap();
        locks.acquire_shared("t", 2).unwrap();
    }

    #[test]
    fn exclusive_conflicts_with_existing_shared() {
        let locks = LockTable::new();
        locks.acquire_shared("t", 1).unwrap();
        assert!(matches!(locks.acquire_exclusive("t", 2), Err(DbError::LockConflict { .. })));
    }

    #[test]
    fn exclusive_conflicts_with_another_exclusive() {
        let locks = LockTable::new();
        locks.acquire_exclusive("t", 1).unwrap();
        assert!(matches!(locks.acquire_exclusive("t", 2), Err(DbError::LockConflict { .. })));
    }

    #[test]
    fn release_all_for_session_frees_locks() {
        let locks = LockTable::new();
        locks.acquire_exclusive("t", 1).unwrap();
        locks.release_all_for_session(1);
        locks.acquire_exclusive("t", 2).unwrap();
    }

    #[test]
    fn same_session_can_reacquire_its_own_exclusive() {
        let locks = LockTable::new();
        locks.acquire_exclusive("t", 1).unwrap();
        locks.acquire_exclusive("t", 1).unwrap();
    }
}
