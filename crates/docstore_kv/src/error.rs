//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur inside the key-value engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    /// The requested key has no live value at the read sequence.
    #[error("key not found")]
    NotFound,

    /// A tracked key was committed by someone else after this
    /// transaction's snapshot was taken.
    #[error("write conflict on key {key:02x?} in column family {column_family}")]
    Busy {
        /// Column family of the conflicting key.
        column_family: String,
        /// The conflicting key.
        key: Vec<u8>,
    },

    /// Stored data is inconsistent.
    #[error("corruption: {0}")]
    Corruption(String),

    /// An argument was rejected by the engine.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rollback or pop was requested with an empty savepoint stack.
    #[error("no savepoint set")]
    NoSavePoint,

    /// The column family handle does not belong to this database, or was dropped.
    #[error("unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// The transaction was already committed or rolled back.
    #[error("transaction is closed")]
    TransactionClosed,

    /// The operation is not supported by this object.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl KvError {
    /// Returns true if this is a not-found status.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true if this is a write conflict.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}
