use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A signed transaction amount as supplied by the caller.
pub type Amount = i64;

/// Opaque, caller-supplied identifier of a transaction.
///
/// Unique within a ledger. Ordering is lexical and only used to keep
/// iteration deterministic; nothing downstream depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self { Self(id.to_string()) }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self { Self(id) }
}

impl Borrow<str> for TransactionId {
    fn borrow(&self) -> &str { &self.0 }
}

/// A single `(id, amount)` entry of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub amount: Amount,
}
