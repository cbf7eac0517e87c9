//! Transaction lifecycle on top of the access strategies.
//!
//! A [`TransactionState`] owns exactly one [`Methods`](crate::Methods)
//! strategy, counts the document operations performed through it, and
//! decides when an intermediate commit is due. The [`TransactionManager`]
//! picks the strategy from [`TransactionOptions`](crate::TransactionOptions).

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{TransactionState, TransactionStatus};
