//! Owns the mutable account record.
pub mod ledger;
pub mod types;

pub use ledger::{Ledger, LedgerError};
pub use types::{Amount, Transaction, TransactionId};
