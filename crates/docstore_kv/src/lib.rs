//! # Docstore KV
//!
//! The ordered key-value engine underneath the docstore access layer.
//!
//! This crate is the lowest-level storage abstraction. It stores **opaque
//! bytes**: keys are ordered byte-lexicographically inside column families
//! and values are never interpreted.
//!
//! ## Provided Primitives
//!
//! - [`Database`] - Shared handle to a multi-version store with a monotonic
//!   [`SequenceNumber`]
//! - [`Snapshot`] - Pinned read position
//! - [`Transaction`] - Optimistic transaction with read-your-writes,
//!   a savepoint stack and an indexing toggle
//! - [`WriteBatch`] / [`WriteBatchWithIndex`] - Non-transactional,
//!   atomically applied groups of writes
//! - [`DbIterator`] - Lazy bidirectional cursor
//!
//! ## Example
//!
//! ```rust
//! use docstore_kv::Database;
//!
//! let db = Database::new();
//! let cf = db.default_column_family();
//!
//! let mut txn = db.begin_transaction();
//! txn.put(&cf, b"hello", b"world").unwrap();
//! assert_eq!(txn.get(&cf, b"hello").unwrap(), Some(b"world".to_vec()));
//! txn.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod db;
mod error;
mod iterator;
mod options;
mod transaction;
mod types;

pub use batch::{BatchLookup, WriteBatch, WriteBatchWithIndex, WriteOp};
pub use db::{ColumnFamilyHandle, Database, Snapshot, DEFAULT_COLUMN_FAMILY};
pub use error::{KvError, KvResult};
pub use iterator::DbIterator;
pub use options::{DbOptions, ReadOptions};
pub use transaction::Transaction;
pub use types::SequenceNumber;
