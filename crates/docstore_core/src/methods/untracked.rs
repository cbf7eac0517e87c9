//! Transaction strategy whose writes skip conflict tracking.

use super::{Methods, TrxMethods};
use crate::error::{CoreResult, StatusHint};
use crate::types::{Key, SequenceNumber};
use docstore_kv::{ColumnFamilyHandle, Database, DbIterator, ReadOptions};

/// Like [`TrxMethods`], but `put` and `delete` do not register their keys
/// for conflict detection.
///
/// Used for bulk work where the caller already holds exclusive access to
/// the affected range. Reads, savepoints and the commit path are shared
/// with [`TrxMethods`].
#[derive(Debug)]
pub struct TrxUntrackedMethods {
    inner: TrxMethods,
}

impl TrxUntrackedMethods {
    /// Begins an engine transaction and wraps it.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            inner: TrxMethods::new(db),
        }
    }

    /// Returns the tracked strategy this one wraps.
    #[must_use]
    pub fn inner(&self) -> &TrxMethods {
        &self.inner
    }
}

impl Methods for TrxUntrackedMethods {
    fn sequence_number(&self) -> SequenceNumber {
        self.inner.sequence_number()
    }

    fn iterator_read_options(&self) -> ReadOptions {
        self.inner.iterator_read_options()
    }

    fn disable_indexing(&self) -> bool {
        self.inner.disable_indexing()
    }

    fn enable_indexing(&self) {
        self.inner.enable_indexing();
    }

    fn exists(&self, cf: &ColumnFamilyHandle, key: &Key) -> bool {
        self.inner.exists(cf, key)
    }

    fn get(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &mut Vec<u8>) -> CoreResult<()> {
        self.inner.get(cf, key, value)
    }

    fn put(
        &self,
        cf: &ColumnFamilyHandle,
        key: &Key,
        value: &[u8],
        hint: StatusHint,
    ) -> CoreResult<()> {
        self.inner.write(cf, key, Some(value), false, hint)
    }

    fn delete(&self, cf: &ColumnFamilyHandle, key: &Key) -> CoreResult<()> {
        self.inner.write(cf, key, None, false, StatusHint::None)
    }

    fn new_iterator(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
    ) -> CoreResult<DbIterator> {
        self.inner.new_iterator(options, cf)
    }

    fn set_save_point(&self) -> CoreResult<()> {
        self.inner.set_save_point()
    }

    fn rollback_to_save_point(&self) -> CoreResult<()> {
        self.inner.rollback_to_save_point()
    }

    fn pop_save_point(&self) -> CoreResult<()> {
        self.inner.pop_save_point()
    }

    fn commit(&self) -> CoreResult<SequenceNumber> {
        self.inner.commit()
    }

    fn abort(&self) -> CoreResult<()> {
        self.inner.abort()
    }
}
