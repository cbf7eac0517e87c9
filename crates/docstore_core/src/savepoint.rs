//! Scoped rollback guard around one document operation.

use crate::error::CoreResult;
use crate::transaction::TransactionState;
use crate::types::OperationType;

/// Guards one document operation with an engine savepoint.
///
/// Created before the operation's writes. If the operation succeeds the
/// caller calls [`SavePoint::finish`]; if the guard is dropped without
/// that, every write since creation is rolled back and the operation is
/// removed from the transaction's counters.
///
/// Single-operation transactions skip the engine savepoint entirely: a
/// failure there aborts the whole transaction anyway.
///
/// If the rollback on drop fails, the transaction is aborted and any later
/// commit reports [`CoreError::TransactionAborted`](crate::CoreError::TransactionAborted).
///
/// ```rust
/// use docstore_core::{Key, OperationType, SavePoint, StatusHint};
/// use docstore_core::{TransactionManager, TransactionOptions};
/// use docstore_kv::Database;
///
/// let db = Database::new();
/// let cf = db.default_column_family();
/// let manager = TransactionManager::new(db);
/// let txn = manager.begin(TransactionOptions::new()).unwrap();
///
/// let save_point = SavePoint::new(&txn, OperationType::Insert).unwrap();
/// txn.methods()
///     .put(&cf, &Key::from("k"), b"v", StatusHint::Document)
///     .unwrap();
/// let committed = txn.add_operation(OperationType::Insert, 2).unwrap();
/// save_point.finish(committed).unwrap();
/// ```
#[derive(Debug)]
#[must_use = "dropping a save point rolls the operation back"]
pub struct SavePoint<'a> {
    state: &'a TransactionState,
    operation: OperationType,
    handled: bool,
}

impl<'a> SavePoint<'a> {
    /// Sets an engine savepoint for `operation`.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the savepoint cannot be set.
    pub fn new(state: &'a TransactionState, operation: OperationType) -> CoreResult<Self> {
        let handled = state.is_single_operation();
        if !handled {
            state.methods().set_save_point()?;
        }
        Ok(Self {
            state,
            operation,
            handled,
        })
    }

    /// Returns the operation this savepoint guards.
    #[must_use]
    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Returns true once the savepoint no longer rolls back on drop.
    #[must_use]
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Acknowledges the operation so nothing is rolled back.
    ///
    /// Pass true if an intermediate commit happened since creation; the
    /// commit already discarded the savepoint, so it is not popped.
    ///
    /// # Errors
    ///
    /// Returns the engine error if popping the savepoint fails. The guard
    /// counts as handled either way.
    pub fn finish(mut self, has_performed_intermediate_commit: bool) -> CoreResult<()> {
        let pop = !self.handled && !has_performed_intermediate_commit;
        self.handled = true;
        if pop {
            self.state.methods().pop_save_point()?;
        }
        Ok(())
    }

    /// Rolls the operation back now and reports the engine status.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the rollback fails; the operation
    /// counter is left untouched then.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.handled = true;
        self.rollback_inner()
    }

    fn rollback_inner(&self) -> CoreResult<()> {
        self.state.methods().rollback_to_save_point()?;
        self.state.rollback_operation(self.operation);
        Ok(())
    }
}

impl Drop for SavePoint<'_> {
    fn drop(&mut self) {
        if self.handled {
            return;
        }
        self.handled = true;
        if let Err(err) = self.rollback_inner() {
            self.state.abort_after_failure(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransactionOptions;
    use crate::error::{ErrorCode, StatusHint};
    use crate::transaction::TransactionManager;
    use crate::types::Key;
    use docstore_kv::Database;

    fn setup(options: TransactionOptions) -> (Database, TransactionState) {
        let db = Database::new();
        let manager = TransactionManager::new(db.clone());
        let txn = manager.begin(options).unwrap();
        (db, txn)
    }

    #[test]
    fn drop_rolls_back_writes_and_counter() {
        let (db, txn) = setup(TransactionOptions::new());
        let cf = db.default_column_family();
        let methods = txn.methods();

        methods.put(&cf, &Key::from("a"), b"1", StatusHint::None).unwrap();
        {
            let _save_point = SavePoint::new(&txn, OperationType::Update).unwrap();
            methods.put(&cf, &Key::from("a"), b"2", StatusHint::None).unwrap();
            txn.add_operation(OperationType::Update, 1).unwrap();
            assert_eq!(txn.num_updates(), 1);
        }

        assert_eq!(methods.get_value(&cf, &Key::from("a")).unwrap(), b"1");
        assert_eq!(txn.num_updates(), 0);
        assert!(txn.is_active());
    }

    #[test]
    fn finish_keeps_writes() {
        let (db, txn) = setup(TransactionOptions::new());
        let cf = db.default_column_family();

        let save_point = SavePoint::new(&txn, OperationType::Insert).unwrap();
        txn.methods()
            .put(&cf, &Key::from("k"), b"v", StatusHint::None)
            .unwrap();
        save_point.finish(false).unwrap();

        assert!(txn.methods().exists(&cf, &Key::from("k")));
        // The savepoint was popped.
        let err = txn.methods().pop_save_point().unwrap_err();
        assert_eq!(err.code(), ErrorCode::PreconditionFailed);
    }

    #[test]
    fn explicit_rollback_reports_status() {
        let (db, txn) = setup(TransactionOptions::new());
        let cf = db.default_column_family();

        let save_point = SavePoint::new(&txn, OperationType::Remove).unwrap();
        txn.methods().delete(&cf, &Key::from("k")).unwrap();
        txn.add_operation(OperationType::Remove, 1).unwrap();
        save_point.rollback().unwrap();

        assert_eq!(txn.num_removes(), 0);
        assert!(txn.is_active());
    }

    #[test]
    fn single_operation_skips_engine_save_point() {
        let options = TransactionOptions::new().single_operation(true);
        let (db, txn) = setup(options);
        let cf = db.default_column_family();

        let save_point = SavePoint::new(&txn, OperationType::Insert).unwrap();
        assert!(save_point.is_handled());
        txn.methods()
            .put(&cf, &Key::from("k"), b"v", StatusHint::None)
            .unwrap();
        drop(save_point);

        // Nothing was rolled back.
        assert!(txn.methods().exists(&cf, &Key::from("k")));
    }

    #[test]
    fn failed_rollback_aborts_transaction() {
        let (_, txn) = setup(TransactionOptions::new());
        {
            let _save_point = SavePoint::new(&txn, OperationType::Insert).unwrap();
            // Remove the engine savepoint behind the guard's back.
            txn.methods().pop_save_point().unwrap();
        }
        assert!(txn.is_aborted());
        assert_eq!(txn.commit().unwrap_err().code(), ErrorCode::TransactionAborted);
    }

    #[test]
    fn batched_drop_leaves_batch_alone() {
        let (db, txn) = setup(TransactionOptions::new().batched(true));
        let cf = db.default_column_family();
        {
            let _save_point = SavePoint::new(&txn, OperationType::Insert).unwrap();
            txn.methods()
                .put(&cf, &Key::from("k"), b"v", StatusHint::None)
                .unwrap();
        }
        assert!(txn.is_active());
        txn.commit().unwrap();
        assert!(txn.methods().exists(&cf, &Key::from("k")));
    }
}
