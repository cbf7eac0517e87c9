//! # Docstore Core
//!
//! Transactional access layer between document operations and the
//! [`docstore_kv`] engine.
//!
//! This crate provides:
//! - [`Methods`] - One capability contract for reads, writes, iterators
//!   and savepoints, with five interchangeable strategies
//! - [`SavePoint`] - Per-operation rollback guard
//! - [`IndexingDisabler`] - Scoped suspension of index maintenance
//! - [`TransactionManager`] / [`TransactionState`] - Strategy selection,
//!   operation counting and intermediate commits
//!
//! ## Example
//!
//! ```rust
//! use docstore_core::{ColumnFamilies, ColumnFamily, Key, OperationType, SavePoint};
//! use docstore_core::{StatusHint, TransactionManager, TransactionOptions};
//! use docstore_kv::Database;
//!
//! let db = Database::new();
//! let families = ColumnFamilies::open(&db).unwrap();
//! let documents = families.handle(ColumnFamily::Documents);
//! let manager = TransactionManager::new(db);
//!
//! let txn = manager.begin(TransactionOptions::new()).unwrap();
//! {
//!     let save_point = SavePoint::new(&txn, OperationType::Insert).unwrap();
//!     txn.methods()
//!         .put(documents, &Key::from("users/1"), b"{}", StatusHint::Document)
//!         .unwrap();
//!     let committed = txn.add_operation(OperationType::Insert, 2).unwrap();
//!     save_point.finish(committed).unwrap();
//! }
//! txn.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod column_family;
mod config;
mod error;
mod indexing;
mod methods;
mod savepoint;
mod transaction;
mod types;

pub use column_family::{ColumnFamilies, ColumnFamily};
pub use config::TransactionOptions;
pub use error::{convert_status, CoreError, CoreResult, ErrorCode, StatusHint};
pub use indexing::IndexingDisabler;
pub use methods::{
    BatchedMethods, BatchedWithIndexMethods, Methods, ReadOnlyMethods, TrxMethods,
    TrxUntrackedMethods,
};
pub use savepoint::SavePoint;
pub use transaction::{TransactionManager, TransactionState, TransactionStatus};
pub use types::{Key, KeyBounds, OperationType, SequenceNumber, TransactionId};
