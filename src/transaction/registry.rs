//! Process-wide registry of active transactions. `TransactionManager`
//! instances (one per session) consult this to discover other sessions'
//! in-flight pending changes when computing visibility.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::transaction::txn::{TxnId, TxnState};

#[derive(Default)]
pub struct TransactionRegistry {
    next_txn_id: AtomicU64,
    active: Mutex<HashMap<TxnId, TxnState>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self {
            next_txn_id: AtomicU64::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Monotonically increasing id, also used as the logical clock value
    /// stamped on the returned transaction's `start_time`.
    pub fn next_txn_id(&self) -> TxnId {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn register(&self, txn: TxnState) {
        self.active.lock().unwrap().insert(txn.txn_id, txn);
    }

    pub fn unregister(&self, txn_id: TxnId) -> Option<TxnState> {
        self.active.lock().unwrap().remove(&txn_id)
    }

    /// Snapshot of every active transaction other than `excluding`, for use
    /// in a reader's visibility computation.
    pub fn other_active(&self, excluding: TxnId) -> Vec<TxnState> {
        self.active
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.txn_id != excluding)
            .cloned()
            .collect()
    }

    pub fn with_txn_mut<R>(&self, txn_id: TxnId, f: impl FnOnce(&mut TxnState) -> R) -> Option<R> {
        self.active.lock().unwrap().get_mut(&txn_id).map(f)
    }

    pub fn get(&self, txn_id: TxnId) -> Option<TxnState> {
        self.active.lock().unwrap().get(&txn_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::txn::IsolationLevel;

    #[test]
    fn txn_ids_are_monotonic() {
        let registry = TransactionRegistry::new();
        let a = registry.next_txn_id();
        let b = registry.next_txn_id();
        assert!(b > a);
    }

    #[test]
    fn other_active_excludes_the_caller() {
        let registry = TransactionRegistry::new();
        let t1 = TxnState::new(1, 10, IsolationLevel::ReadCommitted, 1);
        let t2 = TxnState::new(2, 20, IsolationLevel::ReadCommitted, 2);
        registry.register(t1);
        registry.register(t2);

        let others = registry.other_active(1);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].txn_id, 2);
    }

    #[test]
    fn unregister_removes_from_active_set() {
        let registry = TransactionRegistry::new();
        registry.register(TxnState::new(1, 10, IsolationLevel::ReadCommitted, 1));
        assert!(registry.unregister(1).is_some());
        assert!(registry.other_active(0).is_empty());
    }
}
