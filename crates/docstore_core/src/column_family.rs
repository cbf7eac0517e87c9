//! Well-known column families of the document store.

use crate::error::CoreResult;
use docstore_kv::{ColumnFamilyHandle, Database};

/// The logical keyspaces the document store partitions its data into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Database, collection and view definitions.
    Definitions,
    /// Document bodies.
    Documents,
    /// Primary index entries.
    PrimaryIndex,
    /// Edge index entries.
    EdgeIndex,
    /// Persistent (sorted) secondary index entries.
    PersistentIndex,
    /// Geo index entries.
    GeoIndex,
    /// Fulltext index entries.
    FulltextIndex,
}

impl ColumnFamily {
    /// All column families, in creation order.
    pub const ALL: [ColumnFamily; 7] = [
        Self::Definitions,
        Self::Documents,
        Self::PrimaryIndex,
        Self::EdgeIndex,
        Self::PersistentIndex,
        Self::GeoIndex,
        Self::FulltextIndex,
    ];

    /// Returns the engine-level name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Definitions => "definitions",
            Self::Documents => "documents",
            Self::PrimaryIndex => "primary",
            Self::EdgeIndex => "edge",
            Self::PersistentIndex => "persistent",
            Self::GeoIndex => "geo",
            Self::FulltextIndex => "fulltext",
        }
    }

    /// Returns true for keyspaces holding secondary-index entries.
    #[must_use]
    pub const fn is_secondary_index(self) -> bool {
        matches!(
            self,
            Self::EdgeIndex | Self::PersistentIndex | Self::GeoIndex | Self::FulltextIndex
        )
    }

    const fn position(self) -> usize {
        self as usize
    }
}

/// Handles for every [`ColumnFamily`] of one database.
#[derive(Debug, Clone)]
pub struct ColumnFamilies {
    handles: Vec<ColumnFamilyHandle>,
}

impl ColumnFamilies {
    /// Opens all well-known column families, creating the missing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a column family cannot be created.
    pub fn open(db: &Database) -> CoreResult<Self> {
        let mut handles = Vec::with_capacity(ColumnFamily::ALL.len());
        for cf in ColumnFamily::ALL {
            let handle = match db.column_family(cf.name()) {
                Some(handle) => handle,
                None => db.create_column_family(cf.name())?,
            };
            handles.push(handle);
        }
        Ok(Self { handles })
    }

    /// Returns the handle of a column family.
    #[must_use]
    pub fn handle(&self, cf: ColumnFamily) -> &ColumnFamilyHandle {
        &self.handles[cf.position()]
    }
}
