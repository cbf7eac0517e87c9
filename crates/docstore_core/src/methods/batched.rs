//! Strategies that buffer writes in a batch without transactional isolation.

use super::{fill_value, Methods};
use crate::error::{convert_status, CoreResult, StatusHint};
use crate::types::{Key, SequenceNumber};
use docstore_kv::{ColumnFamilyHandle, Database, DbIterator, ReadOptions, WriteBatch, WriteBatchWithIndex};
use std::cell::RefCell;
use tracing::{debug, warn};

/// Buffers writes in a plain [`WriteBatch`].
///
/// Reads go straight to the latest committed state of the database and do
/// not see the batch. Savepoints are accepted and ignored: a rollback
/// leaves the batch untouched. Used for bulk loads that never read back
/// what they write.
#[derive(Debug)]
pub struct BatchedMethods {
    db: Database,
    batch: RefCell<WriteBatch>,
}

impl BatchedMethods {
    /// Creates a strategy with an empty batch.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            batch: RefCell::new(WriteBatch::new()),
        }
    }

    /// Returns the number of buffered operations.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.batch.borrow().len()
    }
}

impl Methods for BatchedMethods {
    fn sequence_number(&self) -> SequenceNumber {
        self.db.latest_sequence_number()
    }

    fn iterator_read_options(&self) -> ReadOptions {
        ReadOptions::new()
    }

    fn exists(&self, cf: &ColumnFamilyHandle, key: &Key) -> bool {
        match self.db.get(&ReadOptions::new(), cf, key.as_bytes()) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(cf = cf.name(), error = %err, "existence check failed, assuming present");
                true
            }
        }
    }

    fn get(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &mut Vec<u8>) -> CoreResult<()> {
        let found = self.db.get(&ReadOptions::new(), cf, key)?;
        fill_value(found, value)
    }

    fn put(
        &self,
        cf: &ColumnFamilyHandle,
        key: &Key,
        value: &[u8],
        _hint: StatusHint,
    ) -> CoreResult<()> {
        self.batch.borrow_mut().put(cf, key.as_bytes(), value);
        Ok(())
    }

    fn delete(&self, cf: &ColumnFamilyHandle, key: &Key) -> CoreResult<()> {
        self.batch.borrow_mut().delete(cf, key.as_bytes());
        Ok(())
    }

    fn new_iterator(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
    ) -> CoreResult<DbIterator> {
        Ok(self.db.iterator(options, cf)?)
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
        let mut batch = self.batch.borrow_mut();
        if batch.is_empty() {
            return Ok(self.db.latest_sequence_number());
        }
        let sequence = self
            .db
            .write(&batch)
            .map_err(|err| convert_status(err, StatusHint::None))?;
        debug!(ops = batch.len(), %sequence, "write batch applied");
        batch.clear();
        Ok(sequence)
    }

    fn abort(&self) -> CoreResult<()> {
        self.batch.borrow_mut().clear();
        Ok(())
    }
}

/// Buffers writes in a [`WriteBatchWithIndex`] so reads see them.
///
/// Reads consult the batch first and fall back to the latest committed
/// state. Iterators lay the batch over the database. Savepoints are
/// accepted and ignored, as with [`BatchedMethods`].
#[derive(Debug)]
pub struct BatchedWithIndexMethods {
    db: Database,
    batch: RefCell<WriteBatchWithIndex>,
}

impl BatchedWithIndexMethods {
    /// Creates a strategy with an empty indexed batch.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            batch: RefCell::new(WriteBatchWithIndex::new()),
        }
    }

    /// Returns the number of buffered operations.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.batch.borrow().len()
    }

    fn lookup(&self, cf: &ColumnFamilyHandle, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        Ok(self
            .batch
            .borrow()
            .get_from_batch_and_db(&self.db, &ReadOptions::new(), cf, key)?)
    }
}

impl Methods for BatchedWithIndexMethods {
    fn sequence_number(&self) -> SequenceNumber {
        self.db.latest_sequence_number()
    }

    fn iterator_read_options(&self) -> ReadOptions {
        ReadOptions::new()
    }

    fn exists(&self, cf: &ColumnFamilyHandle, key: &Key) -> bool {
        match self.lookup(cf, key.as_bytes()) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(cf = cf.name(), error = %err, "existence check failed, assuming present");
                true
            }
        }
    }

    fn get(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &mut Vec<u8>) -> CoreResult<()> {
        let found = self.lookup(cf, key)?;
        fill_value(found, value)
    }

    fn put(
        &self,
        cf: &ColumnFamilyHandle,
        key: &Key,
        value: &[u8],
        _hint: StatusHint,
    ) -> CoreResult<()> {
        self.batch.borrow_mut().put(cf, key.as_bytes(), value);
        Ok(())
    }

    fn delete(&self, cf: &ColumnFamilyHandle, key: &Key) -> CoreResult<()> {
        self.batch.borrow_mut().delete(cf, key.as_bytes());
        Ok(())
    }

    fn new_iterator(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
    ) -> CoreResult<DbIterator> {
        Ok(self.batch.borrow().iterator_with_base(&self.db, options, cf)?)
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
        let mut batch = self.batch.borrow_mut();
        if batch.is_empty() {
            return Ok(self.db.latest_sequence_number());
        }
        let sequence = self
            .db
            .write(batch.write_batch())
            .map_err(|err| convert_status(err, StatusHint::None))?;
        debug!(ops = batch.len(), %sequence, "indexed write batch applied");
        batch.clear();
        Ok(sequence)
    }

    fn abort(&self) -> CoreResult<()> {
        self.batch.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyBounds;

    fn committed(db: &Database, cf: &ColumnFamilyHandle, key: &[u8]) -> Option<Vec<u8>> {
        db.get(&ReadOptions::new(), cf, key).unwrap()
    }

    #[test]
    fn batched_reads_bypass_the_batch() {
        let db = Database::new();
        let cf = db.default_column_family();
        let methods = BatchedMethods::new(db.clone());

        methods.put(&cf, &Key::from("k"), b"v", StatusHint::None).unwrap();
        assert_eq!(methods.pending_operations(), 1);
        assert!(!methods.exists(&cf, &Key::from("k")));
        assert!(committed(&db, &cf, b"k").is_none());

        methods.commit().unwrap();
        assert_eq!(methods.pending_operations(), 0);
        assert!(methods.exists(&cf, &Key::from("k")));
        assert_eq!(committed(&db, &cf, b"k").as_deref(), Some(&b"v"[..]));
    }

    #[test]
    fn batched_save_points_leave_batch_alone() {
        let db = Database::new();
        let cf = db.default_column_family();
        let methods = BatchedMethods::new(db.clone());

        methods.put(&cf, &Key::from("a"), b"1", StatusHint::None).unwrap();
        methods.set_save_point().unwrap();
        methods.put(&cf, &Key::from("b"), b"2", StatusHint::None).unwrap();
        methods.rollback_to_save_point().unwrap();
        methods.pop_save_point().unwrap();
        assert_eq!(methods.pending_operations(), 2);

        methods.commit().unwrap();
        assert!(committed(&db, &cf, b"a").is_some());
        assert!(committed(&db, &cf, b"b").is_some());
    }

    #[test]
    fn batched_abort_discards_batch() {
        let db = Database::new();
        let cf = db.default_column_family();
        let methods = BatchedMethods::new(db.clone());
        let before = db.latest_sequence_number();

        methods.delete(&cf, &Key::from("k")).unwrap();
        methods.abort().unwrap();
        assert_eq!(methods.pending_operations(), 0);
        assert_eq!(methods.commit().unwrap(), before);
    }

    #[test]
    fn indexed_batch_reads_own_writes() {
        let db = Database::new();
        let cf = db.default_column_family();
        let mut seed = WriteBatch::new();
        seed.put(&cf, b"old", b"x");
        db.write(&seed).unwrap();

        let methods = BatchedWithIndexMethods::new(db.clone());
        methods.put(&cf, &Key::from("new"), b"y", StatusHint::None).unwrap();
        methods.delete(&cf, &Key::from("old")).unwrap();

        assert_eq!(methods.get_value(&cf, &Key::from("new")).unwrap(), b"y");
        assert!(!methods.exists(&cf, &Key::from("old")));
        assert!(committed(&db, &cf, b"old").is_some());

        let entries = methods
            .new_iterator(&ReadOptions::new(), &cf)
            .unwrap()
            .collect_entries()
            .unwrap();
        assert_eq!(entries, vec![(b"new".to_vec(), b"y".to_vec())]);
    }

    #[test]
    fn indexed_batch_counts_over_merged_view() {
        let db = Database::new();
        let cf = db.default_column_family();
        let mut seed = WriteBatch::new();
        seed.put(&cf, b"p/1", b"x");
        db.write(&seed).unwrap();

        let methods = BatchedWithIndexMethods::new(db);
        methods.put(&cf, &Key::from("p/2"), b"x", StatusHint::None).unwrap();

        let bounds = KeyBounds::prefix(b"p/");
        assert_eq!(methods.count_in_bounds(&cf, &bounds, false).unwrap(), 2);
    }

    #[test]
    fn indexed_batch_save_points_are_noops() {
        let db = Database::new();
        let cf = db.default_column_family();
        let methods = BatchedWithIndexMethods::new(db);

        methods.set_save_point().unwrap();
        methods.put(&cf, &Key::from("k"), b"v", StatusHint::None).unwrap();
        methods.rollback_to_save_point().unwrap();
        assert_eq!(methods.get_value(&cf, &Key::from("k")).unwrap(), b"v");
        assert!(!methods.disable_indexing());
    }

    #[test]
    fn exists_reports_present_on_engine_error() {
        let db = Database::new();
        let cf = db.create_column_family("scratch").unwrap();
        let plain = BatchedMethods::new(db.clone());
        let indexed = BatchedWithIndexMethods::new(db.clone());
        assert!(!plain.exists(&cf, &Key::from("k")));
        assert!(!indexed.exists(&cf, &Key::from("k")));

        db.drop_column_family(&cf).unwrap();
        assert!(plain.exists(&cf, &Key::from("k")));
        assert!(indexed.exists(&cf, &Key::from("k")));
    }
}
