//! Bidirectional cursors.

use crate::db::{range_is_empty, ColumnFamilyHandle, Database};
use crate::error::{KvError, KvResult};
use crate::options::ReadOptions;
use crate::types::SequenceNumber;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Uncommitted writes of one column family, laid over the store by a
/// cursor. `None` marks a deletion.
pub(crate) type Delta = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn first_in_delta(
    delta: &Delta,
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
    reverse: bool,
) -> Option<(Vec<u8>, Option<Vec<u8>>)> {
    if range_is_empty(lower, upper) {
        return None;
    }
    let mut range = delta.range::<[u8], _>((lower, upper));
    let entry = if reverse { range.next_back() } else { range.next() };
    entry.map(|(key, value)| (key.clone(), value.clone()))
}

/// A cursor over one column family at a fixed sequence number.
///
/// The cursor is lazy: every positioning call re-seeks the store, so it
/// never materializes the keyspace. It is pinned to the sequence it was
/// created at and does not observe commits made afterwards. When created
/// from a transaction or an indexed batch, the uncommitted writes captured
/// at creation are merged in; they shadow the stored versions and their
/// deletions hide stored keys.
///
/// Bounds from [`ReadOptions`] are honored: the lower bound is inclusive and
/// the upper bound exclusive.
#[derive(Debug)]
pub struct DbIterator {
    db: Database,
    cf: ColumnFamilyHandle,
    sequence: SequenceNumber,
    lower: Option<Vec<u8>>,
    upper: Option<Vec<u8>>,
    delta: Option<Delta>,
    current: Option<(Vec<u8>, Vec<u8>)>,
    status: Option<KvError>,
}

impl DbIterator {
    pub(crate) fn new(
        db: Database,
        cf: ColumnFamilyHandle,
        sequence: SequenceNumber,
        options: &ReadOptions,
        delta: Option<Delta>,
    ) -> Self {
        Self {
            db,
            cf,
            sequence,
            lower: options.iterate_lower_bound.clone(),
            upper: options.iterate_upper_bound.clone(),
            delta,
            current: None,
            status: None,
        }
    }

    /// Returns true if the cursor is positioned on an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Returns the current key.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(key, _)| key.as_slice())
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, value)| value.as_slice())
    }

    /// Returns the error that invalidated the cursor, if any.
    ///
    /// # Errors
    ///
    /// Returns the last error hit while positioning.
    pub fn status(&self) -> KvResult<()> {
        match &self.status {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Returns the sequence number this cursor reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Positions on the first entry.
    pub fn seek_to_first(&mut self) {
        let from = self.lower.clone().map_or(Bound::Unbounded, Bound::Included);
        self.position(from, Direction::Forward);
    }

    /// Positions on the last entry.
    pub fn seek_to_last(&mut self) {
        let from = self.upper.clone().map_or(Bound::Unbounded, Bound::Excluded);
        self.position(from, Direction::Backward);
    }

    /// Positions on the first entry at or after `target`.
    pub fn seek(&mut self, target: &[u8]) {
        let from = match &self.lower {
            Some(lower) if target < lower.as_slice() => Bound::Included(lower.clone()),
            _ => Bound::Included(target.to_vec()),
        };
        self.position(from, Direction::Forward);
    }

    /// Positions on the last entry at or before `target`.
    pub fn seek_for_prev(&mut self, target: &[u8]) {
        let from = match &self.upper {
            Some(upper) if target >= upper.as_slice() => Bound::Excluded(upper.clone()),
            _ => Bound::Included(target.to_vec()),
        };
        self.position(from, Direction::Backward);
    }

    /// Moves to the next entry. Does nothing if the cursor is not valid.
    pub fn next(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.position(Bound::Excluded(key), Direction::Forward);
        }
    }

    /// Moves to the previous entry. Does nothing if the cursor is not valid.
    pub fn prev(&mut self) {
        if let Some((key, _)) = self.current.take() {
            self.position(Bound::Excluded(key), Direction::Backward);
        }
    }

    /// Walks the whole range front to back and returns every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if positioning failed.
    pub fn collect_entries(mut self) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        self.seek_to_first();
        while let Some(entry) = self.current.clone() {
            entries.push(entry);
            self.next();
        }
        self.status()?;
        Ok(entries)
    }

    fn position(&mut self, mut from: Bound<Vec<u8>>, direction: Direction) {
        self.current = None;
        self.status = None;
        let reverse = direction == Direction::Backward;

        loop {
            let (lower, upper) = match direction {
                Direction::Forward => (
                    as_slice_bound(&from),
                    self.upper.as_deref().map_or(Bound::Unbounded, Bound::Excluded),
                ),
                Direction::Backward => (
                    self.lower.as_deref().map_or(Bound::Unbounded, Bound::Included),
                    as_slice_bound(&from),
                ),
            };

            let base = match self
                .db
                .first_live(&self.cf, lower, upper, self.sequence, reverse)
            {
                Ok(base) => base,
                Err(err) => {
                    self.status = Some(err);
                    return;
                }
            };
            let delta = self
                .delta
                .as_ref()
                .and_then(|delta| first_in_delta(delta, lower, upper, reverse));

            // The nearer key wins; on a tie the uncommitted write shadows the stored one.
            let take_delta = match (&base, &delta) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some((base_key, _)), Some((delta_key, _))) => {
                    if reverse {
                        delta_key >= base_key
                    } else {
                        delta_key <= base_key
                    }
                }
            };

            if !take_delta {
                self.current = base;
                return;
            }

            match delta {
                Some((key, Some(value))) => {
                    self.current = Some((key, value));
                    return;
                }
                Some((key, None)) => from = Bound::Excluded(key),
                None => return,
            }
        }
    }
}
