//! Access strategies over the engine.
//!
//! [`Methods`] is the single contract every caller programs against. The
//! transaction manager picks one strategy per transaction and hands out a
//! `&dyn Methods`; callers never branch on which strategy is active.
//!
//! | Strategy | Writes | Savepoints | Isolation |
//! |----------|--------|------------|-----------|
//! | [`ReadOnlyMethods`] | rejected | no-op | snapshot |
//! | [`TrxMethods`] | tracked | engine stack | snapshot + read-your-writes |
//! | [`TrxUntrackedMethods`] | untracked | engine stack | snapshot + read-your-writes |
//! | [`BatchedMethods`] | write batch | no-op | none |
//! | [`BatchedWithIndexMethods`] | indexed write batch | no-op | none, reads own writes |
//!
//! Strategies use interior mutability: every operation takes `&self`, so
//! scoped guards and callers can hold shared references at the same time.
//! They are `Send` but not `Sync`; one strategy serves exactly one
//! transaction context and no locking is added on top of the engine.

mod batched;
mod read_only;
mod trx;
mod untracked;

pub use batched::{BatchedMethods, BatchedWithIndexMethods};
pub use read_only::ReadOnlyMethods;
pub use trx::TrxMethods;
pub use untracked::TrxUntrackedMethods;

use crate::error::{convert_status, CoreResult, StatusHint};
use crate::types::{Key, KeyBounds, SequenceNumber};
use docstore_kv::{ColumnFamilyHandle, DbIterator, KvError, ReadOptions};

/// The capability contract shared by all access strategies.
pub trait Methods: Send {
    /// Returns the engine's current write position.
    ///
    /// Callers use it for staleness checks; this layer does not interpret it.
    fn sequence_number(&self) -> SequenceNumber;

    /// Returns read options suitable for iterators of this scope.
    fn iterator_read_options(&self) -> ReadOptions;

    /// Stops secondary-index maintenance.
    ///
    /// Returns true only if this call performed the disable. The default
    /// implementation does nothing.
    fn disable_indexing(&self) -> bool {
        false
    }

    /// Resumes secondary-index maintenance. The default implementation does
    /// nothing.
    fn enable_indexing(&self) {}

    /// Returns true if a live entry exists in this scope's view.
    ///
    /// Only a definite miss returns false; an engine error is logged and
    /// reported as present.
    fn exists(&self, cf: &ColumnFamilyHandle, key: &Key) -> bool;

    /// Reads a key into `value`.
    ///
    /// `value` is only overwritten on success.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the key has no live entry.
    fn get(&self, cf: &ColumnFamilyHandle, key: &[u8], value: &mut Vec<u8>) -> CoreResult<()>;

    /// Writes a key. `hint` only affects how engine errors are reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy rejects writes or the engine fails.
    fn put(&self, cf: &ColumnFamilyHandle, key: &Key, value: &[u8], hint: StatusHint)
        -> CoreResult<()>;

    /// Deletes a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy rejects writes or the engine fails.
    fn delete(&self, cf: &ColumnFamilyHandle, key: &Key) -> CoreResult<()>;

    /// Creates a cursor over `cf` as seen by this scope.
    ///
    /// # Errors
    ///
    /// Returns an error if the column family is unknown.
    fn new_iterator(&self, options: &ReadOptions, cf: &ColumnFamilyHandle)
        -> CoreResult<DbIterator>;

    /// Marks a rollback point.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the mark cannot be set.
    fn set_save_point(&self) -> CoreResult<()>;

    /// Undoes all writes since the most recent rollback point.
    ///
    /// # Errors
    ///
    /// Returns an error if no rollback point exists or the engine fails.
    fn rollback_to_save_point(&self) -> CoreResult<()>;

    /// Forgets the most recent rollback point without undoing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if no rollback point exists.
    fn pop_save_point(&self) -> CoreResult<()>;

    /// Makes every write of this scope durable and starts a fresh unit of
    /// work. Only the owning transaction state calls this.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if the engine rejects the commit.
    fn commit(&self) -> CoreResult<SequenceNumber>;

    /// Discards every pending write of this scope. Only the owning
    /// transaction state calls this.
    ///
    /// # Errors
    ///
    /// Returns an engine error if the discard fails.
    fn abort(&self) -> CoreResult<()>;

    /// Reads a key and returns an owned value.
    ///
    /// # Errors
    ///
    /// Returns a not found error if the key has no live entry.
    fn get_value(&self, cf: &ColumnFamilyHandle, key: &Key) -> CoreResult<Vec<u8>> {
        let mut value = Vec::new();
        self.get(cf, key.as_bytes(), &mut value)?;
        Ok(value)
    }

    /// Counts the live entries inside `bounds`.
    ///
    /// With `is_element_in_range` set, stops after the first entry, which
    /// answers "is the range non-empty".
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor fails.
    fn count_in_bounds(
        &self,
        cf: &ColumnFamilyHandle,
        bounds: &KeyBounds,
        is_element_in_range: bool,
    ) -> CoreResult<usize> {
        let options = bounds.apply(self.iterator_read_options());
        let mut iter = self.new_iterator(&options, cf)?;
        iter.seek(bounds.start().as_bytes());

        let mut count = 0;
        while let Some(key) = iter.key() {
            if !bounds.contains(key) {
                break;
            }
            count += 1;
            if is_element_in_range {
                break;
            }
            iter.next();
        }
        iter.status()?;
        Ok(count)
    }
}

/// Copies a looked-up value into the caller's buffer, or reports not found.
pub(crate) fn fill_value(found: Option<Vec<u8>>, value: &mut Vec<u8>) -> CoreResult<()> {
    match found {
        Some(found) => {
            *value = found;
            Ok(())
        }
        None => Err(convert_status(KvError::NotFound, StatusHint::None)),
    }
}
