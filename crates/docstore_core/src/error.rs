//! Error types for the access layer.
//!
//! Every operation of the access layer returns a [`CoreResult`]. Nothing
//! panics across the public contract. Engine statuses are mapped to the
//! upward taxonomy by [`convert_status`].

use docstore_kv::KvError;
use std::fmt;
use thiserror::Error;

/// Result type for access layer operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Status codes surfaced to callers of the access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The key, document or object does not exist.
    NotFound,
    /// A write conflicted with a concurrent commit.
    Conflict,
    /// Stored data is inconsistent.
    Corruption,
    /// The caller violated a documented precondition.
    PreconditionFailed,
    /// The active strategy does not support the operation.
    NotSupported,
    /// The transaction was aborted and can no longer commit.
    TransactionAborted,
    /// Any other engine failure, propagated unchanged.
    Engine,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Corruption => "corruption",
            Self::PreconditionFailed => "precondition failed",
            Self::NotSupported => "not supported",
            Self::TransactionAborted => "transaction aborted",
            Self::Engine => "engine error",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in access layer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Lookup found no live entry.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// Write-write conflict detected at commit.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Stored data is corrupted.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// A caller contract was violated.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Description of the violated precondition.
        message: String,
    },

    /// The operation is not supported by the active strategy.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of the unsupported operation.
        message: String,
    },

    /// Transaction was aborted.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// Engine failure without a more specific mapping.
    #[error("engine error: {0}")]
    Engine(#[source] KvError),
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates a precondition failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Returns the status code of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Corruption { .. } => ErrorCode::Corruption,
            Self::PreconditionFailed { .. } => ErrorCode::PreconditionFailed,
            Self::NotSupported { .. } => ErrorCode::NotSupported,
            Self::TransactionAborted { .. } => ErrorCode::TransactionAborted,
            Self::Engine(_) => ErrorCode::Engine,
        }
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound
    }
}

/// Tells [`convert_status`] what kind of object a key refers to.
///
/// Hints only change the wording of a not-found error. They never change
/// whether an operation succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusHint {
    /// No particular object.
    #[default]
    None,
    /// A document.
    Document,
    /// A collection definition.
    Collection,
    /// A view definition.
    View,
    /// An index entry.
    Index,
    /// A database definition.
    Database,
    /// A write-ahead log entry.
    Wal,
}

impl StatusHint {
    fn noun(self) -> &'static str {
        match self {
            Self::None => "key",
            Self::Document => "document",
            Self::Collection => "collection",
            Self::View => "view",
            Self::Index => "index",
            Self::Database => "database",
            Self::Wal => "WAL entry",
        }
    }
}

/// Maps an engine status to an access layer error.
pub fn convert_status(err: KvError, hint: StatusHint) -> CoreError {
    match err {
        KvError::NotFound => CoreError::not_found(format!("{} not found", hint.noun())),
        KvError::Busy { .. } => CoreError::conflict(err.to_string()),
        KvError::Corruption(message) => CoreError::corruption(message),
        KvError::NoSavePoint => CoreError::precondition_failed(err.to_string()),
        KvError::InvalidArgument(message) => CoreError::precondition_failed(message),
        KvError::NotSupported(message) => CoreError::not_supported(message),
        other => CoreError::Engine(other),
    }
}

impl From<KvError> for CoreError {
    fn from(err: KvError) -> Self {
        convert_status(err, StatusHint::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_uses_hint() {
        let err = convert_status(KvError::NotFound, StatusHint::Document);
        assert_eq!(err, CoreError::not_found("document not found"));

        let err = convert_status(KvError::NotFound, StatusHint::None);
        assert_eq!(err.to_string(), "not found: key not found");
    }

    #[test]
    fn engine_statuses_map_to_codes() {
        let busy = KvError::Busy {
            column_family: "documents".into(),
            key: vec![1],
        };
        assert_eq!(CoreError::from(busy).code(), ErrorCode::Conflict);
        assert_eq!(
            CoreError::from(KvError::Corruption("bad".into())).code(),
            ErrorCode::Corruption
        );
        assert_eq!(
            CoreError::from(KvError::NoSavePoint).code(),
            ErrorCode::PreconditionFailed
        );
        assert_eq!(
            CoreError::from(KvError::NotSupported("x".into())).code(),
            ErrorCode::NotSupported
        );
        assert_eq!(
            CoreError::from(KvError::TransactionClosed).code(),
            ErrorCode::Engine
        );
    }

    #[test]
    fn hint_does_not_change_other_statuses() {
        let err = convert_status(KvError::Corruption("torn".into()), StatusHint::Index);
        assert_eq!(err, CoreError::corruption("torn"));
    }
}
