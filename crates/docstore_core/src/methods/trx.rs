//! Strategy backed by a live read-write transaction.

use super::{fill_value, Methods};
use crate::error::{convert_status, CoreResult, StatusHint};
use crate::types::{Key, SequenceNumber};
use docstore_kv::{ColumnFamilyHandle, Database, DbIterator, ReadOptions, Snapshot, Transaction};
use std::cell::{Cell, RefCell};
use tracing::{debug, warn};

/// Runs every operation through an engine [`Transaction`].
///
/// Reads see the transaction's snapshot plus its own writes. Writes register
/// their keys for conflict detection at commit. Savepoints delegate to the
/// transaction's savepoint stack.
///
/// # Disabling indexing
///
/// Indexing may only be disabled in a top-level write transaction that
/// touches exactly one collection and, within the disabled scope, either
/// reads or writes but not both. This is not checked here. While disabled,
/// writes do not enter the read-your-writes index, so a read of a key
/// written under the toggle misses that write.
#[derive(Debug)]
pub struct TrxMethods {
    db: Database,
    trx: RefCell<Transaction>,
    indexing_disabled: Cell<bool>,
}

impl TrxMethods {
    /// Begins an engine transaction and wraps it.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let trx = db.begin_transaction();
        Self {
            db,
            trx: RefCell::new(trx),
            indexing_disabled: Cell::new(false),
        }
    }

    /// Returns true while this instance has indexing disabled.
    #[must_use]
    pub fn is_indexing_disabled(&self) -> bool {
        self.indexing_disabled.get()
    }

    /// Returns the snapshot of the current engine transaction.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.trx.borrow().snapshot()
    }

    /// Returns the number of buffered writes of the current engine transaction.
    #[must_use]
    pub fn pending_writes(&self) -> u64 {
        let trx = self.trx.borrow();
        trx.num_puts() + trx.num_deletes()
    }

    /// Returns the approximate size of the buffered writes in bytes.
    #[must_use]
    pub fn pending_size(&self) -> usize {
        self.trx.borrow().approximate_size()
    }

    pub(super) fn write(
        &self,
        cf: &ColumnFamilyHandle,
        key: &Key,
        value: Option<&[u8]>,
        tracked: bool,
        hint: StatusHint,
    ) -> CoreResult<()> {
        let mut trx = self.trx.borrow_mut();
        let key = key.as_bytes();
        let result = match (value, tracked) {
            (Some(value), true) => trx.put(cf, key, value),
            (Some(value), false) => trx.put_untracked(cf, key, value),
            (None, true) => trx.delete(cf, key),
            (None, false) => trx.delete_untracked(cf, key),
        };
        result.map_err(|err| convert_status(err, hint))
    }

    /// Replaces a finished engine transaction with a fresh one, keeping the
    /// indexing toggle.
    fn restart(&self, trx: &mut Transaction) {
        *trx = self.db.begin_transaction();
        if self.indexing_disabled.get() {
            trx.disable_indexing();
        }
    }
}

impl Methods for TrxMethods {
    fn sequence_number(&self) -> SequenceNumber {
        self.db.latest_sequence_number()
    }

    fn iterator_read_options(&self) -> ReadOptions {
        ReadOptions::new().snapshot(self.snapshot())
    }

    fn disable_indexing(&self) -> bool {
        if self.indexing_disabled.get() {
            return false;
        }
        self.trx.borrow_mut().disable_indexing();
        self.indexing_disabled.set(true);
        debug!("indexing disabled");
        true
    }

    fn enable_indexing(&self) {
        if self.indexing_disabled.get() {
            self.trx.borrow_mut().enable_indexing();
            self.indexing_disabled.set(false);
            debug!("indexing enabled");
        }
    }

    fn exists(&self, cf: &ColumnFamilyHandle, key: &Key) -> bool {
        match self.trx.borrow().get(cf, key.as_bytes()) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(cf = cf.name(), error = %err, "existence check failed, assuming present");
                true
            }
        }
    }

    fn get(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &mut Vec<u8>) -> CoreResult<()> {
        let found = self.trx.borrow().get(cf, key)?;
        fill_value(found, value)
    }

    fn put(
        &self,
        cf: &ColumnFamilyHandle,
        key: &Key,
        value: &[u8],
        hint: StatusHint,
    ) -> CoreResult<()> {
        self.write(cf, key, Some(value), true, hint)
    }

    fn delete(&self, cf: &ColumnFamilyHandle, key: &Key) -> CoreResult<()> {
        self.write(cf, key, None, true, StatusHint::None)
    }

    fn new_iterator(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
    ) -> CoreResult<DbIterator> {
        Ok(self.trx.borrow().iterator(options, cf)?)
    }

    fn set_save_point(&self) -> CoreResult<()> {
        Ok(self.trx.borrow_mut().set_save_point()?)
    }

    fn rollback_to_save_point(&self) -> CoreResult<()> {
        Ok(self.trx.borrow_mut().rollback_to_save_point()?)
    }

    fn pop_save_point(&self) -> CoreResult<()> {
        Ok(self.trx.borrow_mut().pop_save_point()?)
    }

    fn commit(&self) -> CoreResult<SequenceNumber> {
        let mut trx = self.trx.borrow_mut();
        let sequence = trx.commit()?;
        self.restart(&mut trx);
        Ok(sequence)
    }

    fn abort(&self) -> CoreResult<()> {
        let mut trx = self.trx.borrow_mut();
        if !trx.is_closed() {
            trx.rollback()?;
        }
        self.restart(&mut trx);
        Ok(())
    }
}
