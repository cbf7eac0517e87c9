//! Write batches.
//!
//! A [`WriteBatch`] is an append-only list of operations that the database
//! applies atomically. It offers no isolation and no partial rollback: the
//! only way to undo part of a batch is to discard all of it.
//!
//! A [`WriteBatchWithIndex`] additionally indexes its own writes per column
//! family so that reads and iterators can observe them before the batch is
//! written.

use crate::db::{ColumnFamilyHandle, Database};
use crate::error::KvResult;
use crate::iterator::{DbIterator, Delta};
use crate::options::ReadOptions;
use std::collections::HashMap;

/// A single buffered write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite a key.
    Put {
        /// Target column family.
        cf: ColumnFamilyHandle,
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Target column family.
        cf: ColumnFamilyHandle,
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl WriteOp {
    /// Returns the column family this operation targets.
    #[must_use]
    pub fn column_family(&self) -> &ColumnFamilyHandle {
        match self {
            Self::Put { cf, .. } | Self::Delete { cf, .. } => cf,
        }
    }

    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    /// Returns the approximate number of bytes this operation carries.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Put { key, value, .. } => key.len() + value.len(),
            Self::Delete { key, .. } => key.len(),
        }
    }
}

/// An atomically applied group of writes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    data_size: usize,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a put.
    pub fn put(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.push(WriteOp::Put {
            cf: cf.clone(),
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Buffers a delete.
    pub fn delete(&mut self, cf: &ColumnFamilyHandle, key: &[u8]) {
        self.push(WriteOp::Delete {
            cf: cf.clone(),
            key: key.to_vec(),
        });
    }

    pub(crate) fn push(&mut self, op: WriteOp) {
        self.data_size += op.size();
        self.ops.push(op);
    }

    /// Returns the buffered operations in insertion order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of buffered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns the total key and value bytes buffered.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Discards every buffered operation.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.data_size = 0;
    }
}

/// Result of looking a key up in a batch's own index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchLookup<'a> {
    /// The batch does not touch this key.
    Absent,
    /// The batch's latest write for this key is a put.
    Found(&'a [u8]),
    /// The batch's latest write for this key is a delete.
    Deleted,
}

/// A write batch that can be read back before it is written.
#[derive(Debug, Clone, Default)]
pub struct WriteBatchWithIndex {
    batch: WriteBatch,
    index: HashMap<u32, Delta>,
}

impl WriteBatchWithIndex {
    /// Creates an empty indexed batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers and indexes a put.
    pub fn put(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) {
        self.batch.put(cf, key, value);
        self.index
            .entry(cf.id())
            .or_default()
            .insert(key.to_vec(), Some(value.to_vec()));
    }

    /// Buffers and indexes a delete.
    pub fn delete(&mut self, cf: &ColumnFamilyHandle, key: &[u8]) {
        self.batch.delete(cf, key);
        self.index
            .entry(cf.id())
            .or_default()
            .insert(key.to_vec(), None);
    }

    /// Looks a key up in the batch only.
    #[must_use]
    pub fn get_from_batch(&self, cf: &ColumnFamilyHandle, key: &[u8]) -> BatchLookup<'_> {
        match self.index.get(&cf.id()).and_then(|delta| delta.get(key)) {
            None => BatchLookup::Absent,
            Some(Some(value)) => BatchLookup::Found(value),
            Some(None) => BatchLookup::Deleted,
        }
    }

    /// Looks a key up in the batch, falling back to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn get_from_batch_and_db(
        &self,
        db: &Database,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
        key: &[u8],
    ) -> KvResult<Option<Vec<u8>>> {
        match self.get_from_batch(cf, key) {
            BatchLookup::Found(value) => Ok(Some(value.to_vec())),
            BatchLookup::Deleted => Ok(None),
            BatchLookup::Absent => db.get(options, cf, key),
        }
    }

    /// Creates a cursor over the database with this batch's writes laid on top.
    ///
    /// The cursor copies the batch index; later writes to the batch are not
    /// visible through it.
    ///
    /// # Errors
    ///
    /// Returns an error if the column family is unknown.
    pub fn iterator_with_base(
        &self,
        db: &Database,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
    ) -> KvResult<DbIterator> {
        let delta = self.index.get(&cf.id()).cloned();
        db.iterator_with_delta(options, cf, delta)
    }

    /// Returns the underlying write batch.
    #[must_use]
    pub fn write_batch(&self) -> &WriteBatch {
        &self.batch
    }

    /// Returns the number of buffered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Discards every buffered operation and the index.
    pub fn clear(&mut self) {
        self.batch.clear();
        self.index.clear();
    }
}
