//! Engine and read options.

use crate::db::Snapshot;

/// Options for opening a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct DbOptions {
    /// Column families created when the database is opened, in addition
    /// to the default one.
    pub column_families: Vec<String>,

    /// Maximum number of operations accepted in a single committed write
    /// (0 = unlimited).
    pub max_write_ops: usize,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            column_families: Vec::new(),
            max_write_ops: 0,
        }
    }
}

impl DbOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column family to create on open.
    #[must_use]
    pub fn column_family(mut self, name: impl Into<String>) -> Self {
        self.column_families.push(name.into());
        self
    }

    /// Sets the maximum number of operations per committed write.
    #[must_use]
    pub const fn max_write_ops(mut self, value: usize) -> Self {
        self.max_write_ops = value;
        self
    }
}

/// Options controlling a point read or an iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Read at this snapshot instead of the latest sequence.
    pub snapshot: Option<Snapshot>,

    /// Inclusive lower bound for iterators.
    pub iterate_lower_bound: Option<Vec<u8>>,

    /// Exclusive upper bound for iterators.
    pub iterate_upper_bound: Option<Vec<u8>>,
}

impl ReadOptions {
    /// Creates read options that see the latest committed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins reads to a snapshot.
    #[must_use]
    pub fn snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Sets the inclusive lower iteration bound.
    #[must_use]
    pub fn lower_bound(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.iterate_lower_bound = Some(key.into());
        self
    }

    /// Sets the exclusive upper iteration bound.
    #[must_use]
    pub fn upper_bound(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.iterate_upper_bound = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = DbOptions::default();
        assert!(options.column_families.is_empty());
        assert_eq!(options.max_write_ops, 0);
    }

    #[test]
    fn builder_pattern() {
        let options = DbOptions::new()
            .column_family("documents")
            .column_family("primary")
            .max_write_ops(16);

        assert_eq!(options.column_families, vec!["documents", "primary"]);
        assert_eq!(options.max_write_ops, 16);

        let read = ReadOptions::new().lower_bound(b"a".to_vec()).upper_bound(b"m".to_vec());
        assert_eq!(read.iterate_lower_bound.as_deref(), Some(&b"a"[..]));
        assert_eq!(read.iterate_upper_bound.as_deref(), Some(&b"m"[..]));
        assert!(read.snapshot.is_none());
    }
}
