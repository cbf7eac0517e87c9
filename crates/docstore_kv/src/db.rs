//! The database handle and its multi-version store.

use crate::batch::{WriteBatch, WriteOp};
use crate::error::{KvError, KvResult};
use crate::iterator::{DbIterator, Delta};
use crate::options::{DbOptions, ReadOptions};
use crate::transaction::Transaction;
use crate::types::SequenceNumber;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Name of the column family every database has.
pub const DEFAULT_COLUMN_FAMILY: &str = "default";

/// Identifies a column family inside one [`Database`].
///
/// Handles are cheap to clone and are passed by reference to every
/// operation; they never own any data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnFamilyHandle {
    id: u32,
    name: Arc<str>,
}

impl ColumnFamilyHandle {
    /// Returns the numeric id of the column family.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the column family name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A pinned read position.
///
/// Reads through a snapshot see exactly the writes committed at or before
/// its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    sequence: SequenceNumber,
}

impl Snapshot {
    /// Returns the sequence number this snapshot is pinned at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }
}

/// Versions of one key, oldest first. `None` marks a deletion.
type VersionChain = Vec<(SequenceNumber, Option<Vec<u8>>)>;

fn visible(chain: &VersionChain, sequence: SequenceNumber) -> Option<&Vec<u8>> {
    chain
        .iter()
        .rev()
        .find(|(seq, _)| *seq <= sequence)
        .and_then(|(_, value)| value.as_ref())
}

/// Returns true if no key can fall between `lower` and `upper`.
///
/// `BTreeMap::range` panics on inverted bounds, so every range query
/// checks this first.
pub(crate) fn range_is_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}

#[derive(Debug, Default)]
struct Store {
    families: HashMap<u32, BTreeMap<Vec<u8>, VersionChain>>,
}

impl Store {
    fn family(&self, cf: &ColumnFamilyHandle) -> KvResult<&BTreeMap<Vec<u8>, VersionChain>> {
        self.families
            .get(&cf.id)
            .ok_or_else(|| KvError::UnknownColumnFamily(cf.name().to_string()))
    }
}

struct Inner {
    options: DbOptions,
    store: RwLock<Store>,
    handles: RwLock<HashMap<String, ColumnFamilyHandle>>,
    default_cf: ColumnFamilyHandle,
    next_cf_id: AtomicU32,
    last_sequence: AtomicU64,
}

/// An in-memory, ordered, multi-version key-value database.
///
/// Keys are ordered byte-lexicographically within each column family.
/// Every non-empty commit is stamped with the next [`SequenceNumber`], and
/// readers pinned at an older sequence keep seeing the older versions.
///
/// # Thread Safety
///
/// `Database` is a shared handle: clones refer to the same store and may be
/// used from many threads. Transactions and write batches created from it
/// are owned by a single user.
///
/// # Example
///
/// ```rust
/// use docstore_kv::{Database, ReadOptions, WriteBatch};
///
/// let db = Database::new();
/// let cf = db.default_column_family();
///
/// let mut batch = WriteBatch::new();
/// batch.put(&cf, b"k", b"v");
/// db.write(&batch).unwrap();
///
/// let value = db.get(&ReadOptions::new(), &cf, b"k").unwrap();
/// assert_eq!(value.as_deref(), Some(&b"v"[..]));
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Creates an empty database holding only the default column family.
    #[must_use]
    pub fn new() -> Self {
        Self::empty(DbOptions::default())
    }

    /// Opens a database with the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured column family name is duplicated.
    pub fn open(options: DbOptions) -> KvResult<Self> {
        let db = Self::empty(options);
        for name in &db.inner.options.column_families {
            db.create_column_family(name)?;
        }
        Ok(db)
    }

    fn empty(options: DbOptions) -> Self {
        let default_cf = ColumnFamilyHandle {
            id: 0,
            name: Arc::from(DEFAULT_COLUMN_FAMILY),
        };

        let mut store = Store::default();
        store.families.insert(default_cf.id, BTreeMap::new());

        let mut handles = HashMap::new();
        handles.insert(DEFAULT_COLUMN_FAMILY.to_string(), default_cf.clone());

        Self {
            inner: Arc::new(Inner {
                options,
                store: RwLock::new(store),
                handles: RwLock::new(handles),
                default_cf,
                next_cf_id: AtomicU32::new(1),
                last_sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the options the database was opened with.
    #[must_use]
    pub fn options(&self) -> &DbOptions {
        &self.inner.options
    }

    /// Creates a new, empty column family.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::InvalidArgument`] if the name is already in use.
    pub fn create_column_family(&self, name: &str) -> KvResult<ColumnFamilyHandle> {
        let mut handles = self.inner.handles.write();
        if handles.contains_key(name) {
            return Err(KvError::InvalidArgument(format!(
                "column family '{name}' already exists"
            )));
        }

        let handle = ColumnFamilyHandle {
            id: self.inner.next_cf_id.fetch_add(1, Ordering::SeqCst),
            name: Arc::from(name),
        };
        self.inner
            .store
            .write()
            .families
            .insert(handle.id, BTreeMap::new());
        handles.insert(name.to_string(), handle.clone());

        Ok(handle)
    }

    /// Drops a column family and all of its data.
    ///
    /// # Errors
    ///
    /// Returns an error for the default column family or an unknown handle.
    pub fn drop_column_family(&self, cf: &ColumnFamilyHandle) -> KvResult<()> {
        if cf.id == self.inner.default_cf.id {
            return Err(KvError::InvalidArgument(
                "the default column family cannot be dropped".into(),
            ));
        }

        let mut handles = self.inner.handles.write();
        match handles.get(cf.name()) {
            Some(existing) if existing.id == cf.id => {}
            _ => return Err(KvError::UnknownColumnFamily(cf.name().to_string())),
        }
        handles.remove(cf.name());
        self.inner.store.write().families.remove(&cf.id);
        Ok(())
    }

    /// Looks up a column family by name.
    #[must_use]
    pub fn column_family(&self, name: &str) -> Option<ColumnFamilyHandle> {
        self.inner.handles.read().get(name).cloned()
    }

    /// Returns the default column family.
    #[must_use]
    pub fn default_column_family(&self) -> ColumnFamilyHandle {
        self.inner.default_cf.clone()
    }

    /// Returns the names of all column families, sorted.
    #[must_use]
    pub fn column_family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.handles.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the sequence number of the last commit.
    #[must_use]
    pub fn latest_sequence_number(&self) -> SequenceNumber {
        SequenceNumber::new(self.inner.last_sequence.load(Ordering::SeqCst))
    }

    /// Pins the current committed state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sequence: self.latest_sequence_number(),
        }
    }

    /// Reads a key.
    ///
    /// Returns `Ok(None)` if the key has no live value at the read sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the column family is unknown.
    pub fn get(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
        key: &[u8],
    ) -> KvResult<Option<Vec<u8>>> {
        self.get_at(cf, key, self.read_sequence(options))
    }

    pub(crate) fn get_at(
        &self,
        cf: &ColumnFamilyHandle,
        key: &[u8],
        sequence: SequenceNumber,
    ) -> KvResult<Option<Vec<u8>>> {
        let store = self.inner.store.read();
        let family = store.family(cf)?;
        Ok(family
            .get(key)
            .and_then(|chain| visible(chain, sequence))
            .cloned())
    }

    /// Applies a write batch atomically under a single sequence number.
    ///
    /// An empty batch does not advance the sequence counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch references an unknown column family
    /// or exceeds [`DbOptions::max_write_ops`]. Nothing is applied then.
    pub fn write(&self, batch: &WriteBatch) -> KvResult<SequenceNumber> {
        self.commit_ops(batch.ops(), &[], SequenceNumber::default())
    }

    /// Begins an optimistic transaction reading at the current snapshot.
    #[must_use]
    pub fn begin_transaction(&self) -> Transaction {
        Transaction::new(self.clone(), self.snapshot())
    }

    /// Creates a cursor over a column family.
    ///
    /// # Errors
    ///
    /// Returns an error if the column family is unknown.
    pub fn iterator(&self, options: &ReadOptions, cf: &ColumnFamilyHandle) -> KvResult<DbIterator> {
        self.iterator_with_delta(options, cf, None)
    }

    pub(crate) fn iterator_with_delta(
        &self,
        options: &ReadOptions,
        cf: &ColumnFamilyHandle,
        delta: Option<Delta>,
    ) -> KvResult<DbIterator> {
        self.inner.store.read().family(cf)?;
        Ok(DbIterator::new(
            self.clone(),
            cf.clone(),
            self.read_sequence(options),
            options,
            delta,
        ))
    }

    /// Counts the live keys of a column family at the latest sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the column family is unknown.
    pub fn live_key_count(&self, cf: &ColumnFamilyHandle) -> KvResult<usize> {
        let sequence = self.latest_sequence_number();
        let store = self.inner.store.read();
        Ok(store
            .family(cf)?
            .values()
            .filter(|chain| visible(chain, sequence).is_some())
            .count())
    }

    fn read_sequence(&self, options: &ReadOptions) -> SequenceNumber {
        options
            .snapshot
            .map_or_else(|| self.latest_sequence_number(), |s| s.sequence())
    }

    /// Returns the first live entry in `(lower, upper)` walking forward, or
    /// walking backward when `reverse` is set.
    pub(crate) fn first_live(
        &self,
        cf: &ColumnFamilyHandle,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        sequence: SequenceNumber,
        reverse: bool,
    ) -> KvResult<Option<(Vec<u8>, Vec<u8>)>> {
        let store = self.inner.store.read();
        let family = store.family(cf)?;
        if range_is_empty(lower, upper) {
            return Ok(None);
        }

        let live = |(key, chain): (&Vec<u8>, &VersionChain)| {
            visible(chain, sequence).map(|value| (key.clone(), value.clone()))
        };
        let range = family.range::<[u8], _>((lower, upper));
        Ok(if reverse {
            range.rev().find_map(live)
        } else {
            range.into_iter().find_map(live)
        })
    }

    /// Applies `ops` under the next sequence number.
    ///
    /// Fails with [`KvError::Busy`] if any key in `tracked` has a version
    /// committed after `snapshot`.
    pub(crate) fn commit_ops(
        &self,
        ops: &[WriteOp],
        tracked: &[(ColumnFamilyHandle, Vec<u8>)],
        snapshot: SequenceNumber,
    ) -> KvResult<SequenceNumber> {
        let max_ops = self.inner.options.max_write_ops;
        if max_ops > 0 && ops.len() > max_ops {
            return Err(KvError::InvalidArgument(format!(
                "write of {} operations exceeds the limit of {max_ops}",
                ops.len()
            )));
        }

        let mut store = self.inner.store.write();

        for (cf, key) in tracked {
            let newest = store
                .family(cf)?
                .get(key.as_slice())
                .and_then(|chain| chain.last())
                .map(|(seq, _)| *seq);
            if newest.is_some_and(|seq| seq > snapshot) {
                return Err(KvError::Busy {
                    column_family: cf.name().to_string(),
                    key: key.clone(),
                });
            }
        }

        if ops.is_empty() {
            return Ok(self.latest_sequence_number());
        }

        for op in ops {
            store.family(op.column_family())?;
        }

        let sequence = self.latest_sequence_number().next();
        for op in ops {
            let cf = op.column_family();
            let family = store
                .families
                .get_mut(&cf.id)
                .ok_or_else(|| KvError::UnknownColumnFamily(cf.name().to_string()))?;
            match op {
                WriteOp::Put { key, value, .. } => family
                    .entry(key.clone())
                    .or_default()
                    .push((sequence, Some(value.clone()))),
                WriteOp::Delete { key, .. } => {
                    family.entry(key.clone()).or_default().push((sequence, None));
                }
            }
        }
        self.inner
            .last_sequence
            .store(sequence.as_u64(), Ordering::SeqCst);

        Ok(sequence)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("latest_sequence", &self.latest_sequence_number())
            .field("column_families", &self.column_family_names())
            .finish_non_exhaustive()
    }
}
