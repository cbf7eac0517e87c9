//! Transaction configuration.

/// Options deciding which access strategy a transaction uses and when it
/// commits intermediately.
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// The transaction never writes.
    pub read_only: bool,

    /// The transaction performs exactly one document operation; savepoints
    /// are skipped because a failure aborts the whole transaction.
    pub single_operation: bool,

    /// Writes skip conflict-tracking bookkeeping. Only for callers that
    /// already account for it themselves.
    pub untracked: bool,

    /// Writes go to a plain write batch with no transaction semantics.
    pub batched: bool,

    /// Writes go to an index-aware write batch with no transaction semantics.
    pub batched_indexed: bool,

    /// Commit intermediately after this many operations (0 = never).
    pub intermediate_commit_count: u64,

    /// Commit intermediately after this many bytes (0 = never).
    pub intermediate_commit_size: u64,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            single_operation: false,
            untracked: false,
            batched: false,
            batched_indexed: false,
            intermediate_commit_count: 0,
            intermediate_commit_size: 0,
        }
    }
}

impl TransactionOptions {
    /// Creates options for a tracked read-write transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the transaction is read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether the transaction performs a single operation.
    #[must_use]
    pub const fn single_operation(mut self, value: bool) -> Self {
        self.single_operation = value;
        self
    }

    /// Sets whether writes skip conflict tracking.
    #[must_use]
    pub const fn untracked(mut self, value: bool) -> Self {
        self.untracked = value;
        self
    }

    /// Sets whether writes go to a plain write batch.
    #[must_use]
    pub const fn batched(mut self, value: bool) -> Self {
        self.batched = value;
        self
    }

    /// Sets whether writes go to an index-aware write batch.
    #[must_use]
    pub const fn batched_indexed(mut self, value: bool) -> Self {
        self.batched_indexed = value;
        self
    }

    /// Sets the intermediate commit operation threshold.
    #[must_use]
    pub const fn intermediate_commit_count(mut self, count: u64) -> Self {
        self.intermediate_commit_count = count;
        self
    }

    /// Sets the intermediate commit size threshold in bytes.
    #[must_use]
    pub const fn intermediate_commit_size(mut self, size: u64) -> Self {
        self.intermediate_commit_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = TransactionOptions::default();
        assert!(!options.read_only);
        assert!(!options.single_operation);
        assert!(!options.batched);
        assert_eq!(options.intermediate_commit_count, 0);
    }

    #[test]
    fn builder_pattern() {
        let options = TransactionOptions::new()
            .untracked(true)
            .intermediate_commit_count(100)
            .intermediate_commit_size(1024);

        assert!(options.untracked);
        assert_eq!(options.intermediate_commit_count, 100);
        assert_eq!(options.intermediate_commit_size, 1024);
    }
}
