//! Per-transaction bookkeeping.

use crate::config::TransactionOptions;
use crate::error::{CoreError, CoreResult};
use crate::methods::Methods;
use crate::types::{OperationType, SequenceNumber, TransactionId};
use std::cell::Cell;
use std::fmt;
use tracing::{debug, error};

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Operations may be performed.
    Active,
    /// The transaction has been committed.
    Committed,
    /// The transaction has been aborted, explicitly or after a failed rollback.
    Aborted,
}

/// An active transaction and the strategy that serves it.
///
/// All operations take `&self` so that scoped guards such as
/// [`SavePoint`](crate::SavePoint) can borrow the state while the caller
/// keeps using it.
pub struct TransactionState {
    id: TransactionId,
    options: TransactionOptions,
    methods: Box<dyn Methods>,
    status: Cell<TransactionStatus>,
    num_inserts: Cell<u64>,
    num_updates: Cell<u64>,
    num_removes: Cell<u64>,
    /// Operations and bytes since the last (intermediate) commit.
    pending_operations: Cell<u64>,
    pending_size: Cell<u64>,
    num_intermediate_commits: Cell<u64>,
}

impl TransactionState {
    /// Wraps a strategy.
    pub(crate) fn new(
        id: TransactionId,
        options: TransactionOptions,
        methods: Box<dyn Methods>,
    ) -> Self {
        Self {
            id,
            options,
            methods,
            status: Cell::new(TransactionStatus::Active),
            num_inserts: Cell::new(0),
            num_updates: Cell::new(0),
            num_removes: Cell::new(0),
            pending_operations: Cell::new(0),
            pending_size: Cell::new(0),
            num_intermediate_commits: Cell::new(0),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the options the transaction was started with.
    #[must_use]
    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// Returns the access strategy.
    #[must_use]
    pub fn methods(&self) -> &dyn Methods {
        self.methods.as_ref()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status.get()
    }

    /// Returns true while operations may be performed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.get() == TransactionStatus::Active
    }

    /// Returns true once the transaction was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.status.get() == TransactionStatus::Aborted
    }

    /// Returns true if the transaction performs exactly one operation.
    #[must_use]
    pub fn is_single_operation(&self) -> bool {
        self.options.single_operation
    }

    /// Number of inserts counted so far.
    #[must_use]
    pub fn num_inserts(&self) -> u64 {
        self.num_inserts.get()
    }

    /// Number of updates and replaces counted so far.
    #[must_use]
    pub fn num_updates(&self) -> u64 {
        self.num_updates.get()
    }

    /// Number of removes counted so far.
    #[must_use]
    pub fn num_removes(&self) -> u64 {
        self.num_removes.get()
    }

    /// Number of intermediate commits performed.
    #[must_use]
    pub fn num_intermediate_commits(&self) -> u64 {
        self.num_intermediate_commits.get()
    }

    /// Counts a successful operation of `size` bytes and commits
    /// intermediately if a configured threshold is reached.
    ///
    /// Returns true if an intermediate commit was performed; the caller
    /// passes this on to [`SavePoint::finish`](crate::SavePoint::finish).
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is no longer active or the
    /// intermediate commit fails.
    pub fn add_operation(&self, operation: OperationType, size: u64) -> CoreResult<bool> {
        self.ensure_active()?;
        let counter = self.counter(operation);
        counter.set(counter.get() + 1);

        let operations = self.pending_operations.get() + 1;
        let size = self.pending_size.get().saturating_add(size);
        self.pending_operations.set(operations);
        self.pending_size.set(size);

        if self.options.single_operation || !self.intermediate_commit_due(operations, size) {
            return Ok(false);
        }

        let sequence = self.methods.commit()?;
        self.pending_operations.set(0);
        self.pending_size.set(0);
        self.num_intermediate_commits
            .set(self.num_intermediate_commits.get() + 1);
        debug!(txn = %self.id, %sequence, operations, size, "intermediate commit");
        Ok(true)
    }

    /// Reverts the counter of a rolled-back operation.
    pub fn rollback_operation(&self, operation: OperationType) {
        let counter = self.counter(operation);
        counter.set(counter.get().saturating_sub(1));
        self.pending_operations
            .set(self.pending_operations.get().saturating_sub(1));
    }

    /// Commits every remaining write.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionAborted`] if the transaction was
    /// aborted, a precondition error if it was already committed, or the
    /// strategy's commit error. A failed commit leaves the state active so
    /// the caller can abort it.
    pub fn commit(&self) -> CoreResult<SequenceNumber> {
        self.ensure_active()?;
        let sequence = self.methods.commit()?;
        self.status.set(TransactionStatus::Committed);
        debug!(
            txn = %self.id,
            %sequence,
            inserts = self.num_inserts(),
            updates = self.num_updates(),
            removes = self.num_removes(),
            "transaction committed"
        );
        Ok(sequence)
    }

    /// Discards every write not yet committed.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if the transaction already finished, or
    /// the strategy's abort error.
    pub fn abort(&self) -> CoreResult<()> {
        self.ensure_active()?;
        self.status.set(TransactionStatus::Aborted);
        self.methods.abort()?;
        debug!(txn = %self.id, "transaction aborted");
        Ok(())
    }

    /// Aborts after a rollback could not restore a consistent state.
    pub(crate) fn abort_after_failure(&self, cause: &CoreError) {
        if !self.is_active() {
            return;
        }
        self.status.set(TransactionStatus::Aborted);
        error!(txn = %self.id, error = %cause, "rollback failed, aborting transaction");
        if let Err(err) = self.methods.abort() {
            error!(txn = %self.id, error = %err, "abort after failed rollback also failed");
        }
    }

    fn counter(&self, operation: OperationType) -> &Cell<u64> {
        match operation {
            OperationType::Insert => &self.num_inserts,
            OperationType::Update | OperationType::Replace => &self.num_updates,
            OperationType::Remove => &self.num_removes,
        }
    }

    fn intermediate_commit_due(&self, operations: u64, size: u64) -> bool {
        let count = self.options.intermediate_commit_count;
        let max_size = self.options.intermediate_commit_size;
        (count > 0 && operations >= count) || (max_size > 0 && size >= max_size)
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.status.get() {
            TransactionStatus::Active => Ok(()),
            TransactionStatus::Aborted => Err(CoreError::transaction_aborted(format!(
                "transaction {} was aborted",
                self.id
            ))),
            TransactionStatus::Committed => Err(CoreError::precondition_failed(format!(
                "transaction {} is already committed",
                self.id
            ))),
        }
    }
}

impl fmt::Debug for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionState")
            .field("id", &self.id)
            .field("status", &self.status.get())
            .field("options", &self.options)
            .field("num_inserts", &self.num_inserts.get())
            .field("num_updates", &self.num_updates.get())
            .field("num_removes", &self.num_removes.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, StatusHint};
    use crate::methods::TrxMethods;
    use crate::types::Key;
    use docstore_kv::{Database, ReadOptions};

    fn state(db: &Database, options: TransactionOptions) -> TransactionState {
        TransactionState::new(
            TransactionId(1),
            options,
            Box::new(TrxMethods::new(db.clone())),
        )
    }

    #[test]
    fn counts_operations_by_type() {
        let db = Database::new();
        let state = state(&db, TransactionOptions::new());

        state.add_operation(OperationType::Insert, 10).unwrap();
        state.add_operation(OperationType::Update, 10).unwrap();
        state.add_operation(OperationType::Replace, 10).unwrap();
        state.add_operation(OperationType::Remove, 10).unwrap();
        assert_eq!(state.num_inserts(), 1);
        assert_eq!(state.num_updates(), 2);
        assert_eq!(state.num_removes(), 1);

        state.rollback_operation(OperationType::Replace);
        state.rollback_operation(OperationType::Remove);
        state.rollback_operation(OperationType::Remove);
        assert_eq!(state.num_updates(), 1);
        assert_eq!(state.num_removes(), 0);
    }

    #[test]
    fn intermediate_commit_by_count() {
        let db = Database::new();
        let cf = db.default_column_family();
        let state = state(&db, TransactionOptions::new().intermediate_commit_count(2));

        state
            .methods()
            .put(&cf, &Key::from("a"), b"1", StatusHint::Document)
            .unwrap();
        assert!(!state.add_operation(OperationType::Insert, 1).unwrap());

        state
            .methods()
            .put(&cf, &Key::from("b"), b"2", StatusHint::Document)
            .unwrap();
        assert!(state.add_operation(OperationType::Insert, 1).unwrap());
        assert_eq!(state.num_intermediate_commits(), 1);

        // Already visible to everyone.
        assert!(db.get(&ReadOptions::new(), &cf, b"a").unwrap().is_some());
        assert!(state.is_active());
    }

    #[test]
    fn intermediate_commit_by_size() {
        let db = Database::new();
        let state = state(&db, TransactionOptions::new().intermediate_commit_size(100));

        assert!(!state.add_operation(OperationType::Insert, 60).unwrap());
        assert!(state.add_operation(OperationType::Insert, 60).unwrap());
        assert!(!state.add_operation(OperationType::Insert, 60).unwrap());
    }

    #[test]
    fn single_operation_never_commits_intermediately() {
        let db = Database::new();
        let options = TransactionOptions::new()
            .single_operation(true)
            .intermediate_commit_count(1);
        let state = state(&db, options);

        assert!(!state.add_operation(OperationType::Insert, 1).unwrap());
        assert_eq!(state.num_intermediate_commits(), 0);
    }

    #[test]
    fn commit_and_abort_are_single_use() {
        let db = Database::new();
        let committed = state(&db, TransactionOptions::new());
        committed.commit().unwrap();
        assert_eq!(committed.status(), TransactionStatus::Committed);
        assert_eq!(
            committed.commit().unwrap_err().code(),
            ErrorCode::PreconditionFailed
        );
        assert!(committed.abort().is_err());

        let aborted = state(&db, TransactionOptions::new());
        aborted.abort().unwrap();
        assert!(aborted.is_aborted());
        assert_eq!(
            aborted.commit().unwrap_err().code(),
            ErrorCode::TransactionAborted
        );
        assert!(aborted.add_operation(OperationType::Insert, 1).is_err());
    }
}
