//! Strategy for transactions that never write.

use super::{fill_value, Methods};
use crate::error::{CoreError, CoreResult, StatusHint};
use crate::types::{Key, SequenceNumber};
use docstore_kv::{ColumnFamilyHandle, Database, DbIterator, ReadOptions, Snapshot};
use tracing::warn;

/// Reads against a snapshot fixed when the strategy is created.
///
/// Writes fail with a not supported error and never reach the engine.
/// There is nothing to roll back, so savepoint operations succeed as no-ops.
#[derive(Debug)]
pub struct ReadOnlyMethods {
    db: Database,
    snapshot: Snapshot,
}

impl ReadOnlyMethods {
    /// Creates a read-only strategy pinned at the current committed state.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let snapshot = db.snapshot();
        Self { db, snapshot }
    }

    /// Returns the snapshot all reads use.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions::new().snapshot(self.snapshot)
    }
}

impl Methods for ReadOnlyMethods {
    fn sequence_number(&self) -> SequenceNumber {
        self.db.latest_sequence_number()
    }

    fn iterator_read_options(&self) -> ReadOptions {
        self.read_options()
    }

    fn exists(&self, cf: &ColumnFamilyHandle, key: &Key) -> bool {
        match self.db.get(&self.read_options(), cf, key.as_bytes()) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(cf = cf.name(), error = %err, "existence check failed, assuming present");
                true
            }
        }
    }

    fn get(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &mut Vec<u8>) -> CoreResult<()> {
        fill_value(self.db.get(&self.read_options(), cf, key)?, value)
    }

    fn put(&self, _: &ColumnFamilyHandle, _: &Key, _: &[u8], _: StatusHint) -> CoreResult<()> {
        Err(CoreError::not_supported(
            "put is not supported in a read-only transaction",
        ))
    }

    fn delete(&self, _: &ColumnFamilyHandle, _: &Key) -> CoreResult<()> {
        Err(CoreError::not_supported(
            "delete is not supported in a read-only transaction",
        ))
    }

    fn new_iterator(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
    ) -> CoreResult<DbIterator> {
        let mut options = options.clone();
        if options.snapshot.is_none() {
            options.snapshot = Some(self.snapshot);
        }
        Ok(self.db.iterator(&options, cf)?)
    }

    fn set_save_point(&self) -> CoreResult<()> {
        Ok(())
    }

    fn rollback_to_save_point(&self) -> CoreResult<()> {
        Ok(())
    }

    fn pop_save_point(&self) -> CoreResult<()> {
        Ok(())
    }

    fn commit(&self) -> CoreResult<SequenceNumber> {
        Ok(self.snapshot.sequence())
    }

    fn abort(&self) -> CoreResult<()> {
        Ok(())
    }
}
