//! Optimistic read-write transactions.

use crate::batch::WriteOp;
use crate::db::{ColumnFamilyHandle, Database, Snapshot};
use crate::error::{KvError, KvResult};
use crate::iterator::{DbIterator, Delta};
use crate::options::ReadOptions;
use crate::types::SequenceNumber;
use std::collections::{HashMap, HashSet};

/// Undo record for one indexed write: the index entry it replaced.
#[derive(Debug)]
struct UndoEntry {
    cf: u32,
    key: Vec<u8>,
    previous: Option<Option<Vec<u8>>>,
}

/// Everything needed to return to the state at `set_save_point`.
#[derive(Debug, Clone, Copy)]
struct SavePointMark {
    log_len: usize,
    undo_len: usize,
    tracked_len: usize,
    num_puts: u64,
    num_deletes: u64,
    size: usize,
}

/// A read-write transaction with snapshot reads and read-your-writes.
///
/// Writes are buffered until [`Transaction::commit`] and are visible to this
/// transaction's own reads and iterators (unless indexing is disabled, see
/// below). Reads of keys the transaction has not written see the snapshot
/// taken at [`Database::begin_transaction`].
///
/// ## Conflict detection
///
/// Tracked writes (`put`, `delete`) register their key. Commit fails with
/// [`KvError::Busy`] if another commit touched a tracked key after this
/// transaction's snapshot. Untracked writes skip the registration.
///
/// ## Indexing
///
/// While indexing is disabled, writes are still committed but are not
/// recorded in the index that serves this transaction's reads. Reads of
/// those keys see the snapshot, not the write.
///
/// ## Savepoints
///
/// Savepoints form a stack. Rolling back to the top savepoint undoes every
/// write, key registration and counter change made since it was set.
#[derive(Debug)]
pub struct Transaction {
    db: Database,
    snapshot: Snapshot,
    log: Vec<WriteOp>,
    index: HashMap<u32, Delta>,
    undo: Vec<UndoEntry>,
    tracked: Vec<(ColumnFamilyHandle, Vec<u8>)>,
    tracked_set: HashSet<(u32, Vec<u8>)>,
    save_points: Vec<SavePointMark>,
    indexing_disabled: bool,
    num_puts: u64,
    num_deletes: u64,
    size: usize,
    closed: bool,
}

impl Transaction {
    pub(crate) fn new(db: Database, snapshot: Snapshot) -> Self {
        Self {
            db,
            snapshot,
            log: Vec::new(),
            index: HashMap::new(),
            undo: Vec::new(),
            tracked: Vec::new(),
            tracked_set: HashSet::new(),
            save_points: Vec::new(),
            indexing_disabled: false,
            num_puts: 0,
            num_deletes: 0,
            size: 0,
            closed: false,
        }
    }

    /// Returns the snapshot reads are pinned at.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    /// Returns the database this transaction belongs to.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns true once committed or rolled back.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of puts buffered.
    #[must_use]
    pub fn num_puts(&self) -> u64 {
        self.num_puts
    }

    /// Number of deletes buffered.
    #[must_use]
    pub fn num_deletes(&self) -> u64 {
        self.num_deletes
    }

    /// Approximate number of key and value bytes buffered.
    #[must_use]
    pub fn approximate_size(&self) -> usize {
        self.size
    }

    /// Number of savepoints on the stack.
    #[must_use]
    pub fn save_point_depth(&self) -> usize {
        self.save_points.len()
    }

    /// Reads a key, seeing this transaction's own indexed writes first.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed or the column family
    /// is unknown.
    pub fn get(&self, cf: &ColumnFamilyHandle, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        if let Some(entry) = self.index.get(&cf.id()).and_then(|delta| delta.get(key)) {
            return Ok(entry.clone());
        }
        self.db.get_at(cf, key, self.snapshot.sequence())
    }

    /// Buffers a tracked put.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed.
    pub fn put(&mut self, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) -> KvResult<()> {
        self.write(cf, key, Some(value), true)
    }

    /// Buffers a tracked delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed.
    pub fn delete(&mut self, cf: &ColumnFamilyHandle, key: &[u8]) -> KvResult<()> {
        self.write(cf, key, None, true)
    }

    /// Buffers a put without registering the key for conflict detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed.
    pub fn put_untracked(
        &mut self,
        cf: &ColumnFamilyHandle,
        key: &[u8],
        value: &[u8],
    ) -> KvResult<()> {
        self.write(cf, key, Some(value), false)
    }

    /// Buffers a delete without registering the key for conflict detection.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed.
    pub fn delete_untracked(&mut self, cf: &ColumnFamilyHandle, key: &[u8]) -> KvResult<()> {
        self.write(cf, key, None, false)
    }

    fn write(
        &mut self,
        cf: &ColumnFamilyHandle,
        key: &[u8],
        value: Option<&[u8]>,
        tracked: bool,
    ) -> KvResult<()> {
        self.ensure_open()?;

        if tracked && self.tracked_set.insert((cf.id(), key.to_vec())) {
            self.tracked.push((cf.clone(), key.to_vec()));
        }

        let op = match value {
            Some(value) => {
                self.num_puts += 1;
                WriteOp::Put {
                    cf: cf.clone(),
                    key: key.to_vec(),
                    value: value.to_vec(),
                }
            }
            None => {
                self.num_deletes += 1;
                WriteOp::Delete {
                    cf: cf.clone(),
                    key: key.to_vec(),
                }
            }
        };
        self.size += op.size();
        self.log.push(op);

        if !self.indexing_disabled {
            let previous = self
                .index
                .entry(cf.id())
                .or_default()
                .insert(key.to_vec(), value.map(<[u8]>::to_vec));
            // Undo entries only serve rollbacks to an open savepoint.
            if !self.save_points.is_empty() {
                self.undo.push(UndoEntry {
                    cf: cf.id(),
                    key: key.to_vec(),
                    previous,
                });
            }
        }

        Ok(())
    }

    /// Stops recording writes in the read-your-writes index.
    pub fn disable_indexing(&mut self) {
        self.indexing_disabled = true;
    }

    /// Resumes recording writes in the read-your-writes index.
    pub fn enable_indexing(&mut self) {
        self.indexing_disabled = false;
    }

    /// Returns true while indexing is disabled.
    #[must_use]
    pub fn is_indexing_disabled(&self) -> bool {
        self.indexing_disabled
    }

    /// Pushes a savepoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed.
    pub fn set_save_point(&mut self) -> KvResult<()> {
        self.ensure_open()?;
        self.save_points.push(SavePointMark {
            log_len: self.log.len(),
            undo_len: self.undo.len(),
            tracked_len: self.tracked.len(),
            num_puts: self.num_puts,
            num_deletes: self.num_deletes,
            size: self.size,
        });
        Ok(())
    }

    /// Undoes everything since the most recent savepoint and pops it.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NoSavePoint`] if the stack is empty.
    pub fn rollback_to_save_point(&mut self) -> KvResult<()> {
        self.ensure_open()?;
        let mark = self.save_points.pop().ok_or(KvError::NoSavePoint)?;

        self.log.truncate(mark.log_len);

        while self.undo.len() > mark.undo_len {
            let Some(entry) = self.undo.pop() else { break };
            let delta = self.index.entry(entry.cf).or_default();
            match entry.previous {
                Some(previous) => {
                    delta.insert(entry.key, previous);
                }
                None => {
                    delta.remove(&entry.key);
                }
            }
        }

        for (cf, key) in self.tracked.drain(mark.tracked_len..) {
            self.tracked_set.remove(&(cf.id(), key));
        }

        self.num_puts = mark.num_puts;
        self.num_deletes = mark.num_deletes;
        self.size = mark.size;
        Ok(())
    }

    /// Discards the most recent savepoint without undoing anything.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::NoSavePoint`] if the stack is empty.
    pub fn pop_save_point(&mut self) -> KvResult<()> {
        self.ensure_open()?;
        self.save_points.pop().ok_or(KvError::NoSavePoint)?;
        if self.save_points.is_empty() {
            self.undo.clear();
        }
        Ok(())
    }

    /// Creates a cursor that merges this transaction's indexed writes over
    /// its snapshot (or the snapshot given in `options`).
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is closed or the column family
    /// is unknown.
    pub fn iterator(&self, options: &ReadOptions, cf: &ColumnFamilyHandle) -> KvResult<DbIterator> {
        self.ensure_open()?;
        let mut options = options.clone();
        if options.snapshot.is_none() {
            options.snapshot = Some(self.snapshot);
        }
        let delta = self.index.get(&cf.id()).cloned();
        self.db.iterator_with_delta(&options, cf, delta)
    }

    /// Commits all buffered writes atomically.
    ///
    /// On conflict nothing is applied and the transaction stays open, so the
    /// caller can still roll it back.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Busy`] on a write conflict, or another engine
    /// error if the write is rejected.
    pub fn commit(&mut self) -> KvResult<SequenceNumber> {
        self.ensure_open()?;
        let sequence = self
            .db
            .commit_ops(&self.log, &self.tracked, self.snapshot.sequence())?;
        self.reset();
        self.closed = true;
        Ok(sequence)
    }

    /// Discards all buffered writes and closes the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already closed.
    pub fn rollback(&mut self) -> KvResult<()> {
        self.ensure_open()?;
        self.reset();
        self.closed = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.log.clear();
        self.index.clear();
        self.undo.clear();
        self.tracked.clear();
        self.tracked_set.clear();
        self.save_points.clear();
        self.num_puts = 0;
        self.num_deletes = 0;
        self.size = 0;
    }

    fn ensure_open(&self) -> KvResult<()> {
        if self.closed {
            Err(KvError::TransactionClosed)
        } else {
            Ok(())
        }
    }
}
