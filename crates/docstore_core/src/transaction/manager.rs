//! Transaction manager.

use crate::config::TransactionOptions;
use crate::error::{CoreError, CoreResult};
use crate::methods::{
    BatchedMethods, BatchedWithIndexMethods, Methods, ReadOnlyMethods, TrxMethods,
    TrxUntrackedMethods,
};
use crate::transaction::state::TransactionState;
use crate::types::TransactionId;
use docstore_kv::Database;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Hands out transactions over one database.
///
/// The manager chooses the access strategy from [`TransactionOptions`]:
///
/// | Options | Strategy |
/// |---------|----------|
/// | `read_only` | [`ReadOnlyMethods`] |
/// | `batched` | [`BatchedMethods`] |
/// | `batched_indexed` | [`BatchedWithIndexMethods`] |
/// | `untracked` | [`TrxUntrackedMethods`] |
/// | none of the above | [`TrxMethods`] |
///
/// Callers only ever see the strategy as `&dyn Methods`.
///
/// # Example
///
/// ```rust
/// use docstore_core::{Key, StatusHint, TransactionManager, TransactionOptions};
/// use docstore_kv::Database;
///
/// let db = Database::new();
/// let cf = db.default_column_family();
/// let manager = TransactionManager::new(db);
///
/// let txn = manager.begin(TransactionOptions::new()).unwrap();
/// txn.methods()
///     .put(&cf, &Key::from("k"), b"v", StatusHint::Document)
///     .unwrap();
/// txn.commit().unwrap();
/// ```
#[derive(Debug)]
pub struct TransactionManager {
    db: Database,
    next_txid: AtomicU64,
}

impl TransactionManager {
    /// Creates a manager for `db`.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            next_txid: AtomicU64::new(1),
        }
    }

    /// Returns the database transactions run against.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Begins a transaction with the strategy `options` call for.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for contradictory options: read-only
    /// combined with a write mode, or both batch modes at once.
    pub fn begin(&self, options: TransactionOptions) -> CoreResult<TransactionState> {
        let (methods, strategy) = self.select(&options)?;
        let id = TransactionId(self.next_txid.fetch_add(1, Ordering::SeqCst));
        debug!(txn = %id, strategy, "transaction started");
        Ok(TransactionState::new(id, options, methods))
    }

    fn select(
        &self,
        options: &TransactionOptions,
    ) -> CoreResult<(Box<dyn Methods>, &'static str)> {
        let batched = options.batched || options.batched_indexed;
        if options.read_only && (batched || options.untracked) {
            return Err(CoreError::precondition_failed(
                "a read-only transaction cannot use a write mode",
            ));
        }
        if options.batched && options.batched_indexed {
            return Err(CoreError::precondition_failed(
                "batched and batched_indexed are mutually exclusive",
            ));
        }

        let db = self.db.clone();
        let selected: (Box<dyn Methods>, &'static str) = if options.read_only {
            (Box::new(ReadOnlyMethods::new(db)), "read-only")
        } else if options.batched {
            (Box::new(BatchedMethods::new(db)), "batched")
        } else if options.batched_indexed {
            (Box::new(BatchedWithIndexMethods::new(db)), "batched-indexed")
        } else if options.untracked {
            (Box::new(TrxUntrackedMethods::new(db)), "untracked")
        } else {
            (Box::new(TrxMethods::new(db)), "tracked")
        };
        Ok(selected)
    }
}
