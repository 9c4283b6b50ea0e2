//! ledger.rs
//! The authoritative record of an account: a fixed opening balance plus the
//! live transactions keyed by id.

use super::types::{Amount, Transaction, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use self::error::LedgerError;
mod error {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum LedgerError {
        #[error("Transaction ID '{0}' already exists")]
        DuplicateId(TransactionId),
        #[error("Transaction ID '{0}' does not exist")]
        UnknownId(TransactionId),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    initial_balance: Amount,
    transactions: BTreeMap<TransactionId, Amount>,
}

impl Ledger {
    pub fn new(initial_balance: Amount) -> Self {
        Self { initial_balance, transactions: BTreeMap::new() }
    }

    pub fn initial_balance(&self) -> Amount { self.initial_balance }
    pub fn len(&self) -> usize { self.transactions.len() }
    pub fn is_empty(&self) -> bool { self.transactions.is_empty() }

    pub fn contains(&self, id: &str) -> bool { self.transactions.contains_key(id) }

    pub fn get(&self, id: &str) -> Option<Amount> { self.transactions.get(id).copied() }

    /// Inserts a transaction. The amount is taken as-is: sign and magnitude
    /// are only judged when the derived constraints are checked.
    pub fn add(&mut self, id: TransactionId, amount: Amount) -> Result<(), LedgerError> {
        if self.transactions.contains_key(&id) {
            return Err(LedgerError::DuplicateId(id));
        }
        self.transactions.insert(id, amount);
        Ok(())
    }

    /// Deletes a transaction and hands back the amount it carried.
    pub fn remove(&mut self, id: &str) -> Result<Amount, LedgerError> {
        self.transactions
            .remove(id)
            .ok_or_else(|| LedgerError::UnknownId(TransactionId::from(id)))
    }

    pub fn transactions(&self) -> impl Iterator<Item = Transaction> + '_ {
        self.transactions
            .iter()
            .map(|(id, &amount)| Transaction { id: id.clone(), amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(entries: &[(&str, Amount)]) -> Ledger {
        let mut ledger = Ledger::new(1000);
        for (id, amount) in entries {
            ledger.add((*id).into(), *amount).expect("Setup add failed");
        }
        ledger
    }

    #[test]
    fn test_duplicate_id_leaves_ledger_unchanged() {
        let mut ledger = ledger_with(&[("t1", 500)]);
        let before = ledger.clone();

        let err = ledger.add("t1".into(), 900).unwrap_err();

        assert_eq!(err, LedgerError::DuplicateId("t1".into()));
        assert_eq!(ledger, before);
        assert_eq!(ledger.get("t1"), Some(500));
    }

    #[test]
    fn test_unknown_id_leaves_ledger_unchanged() {
        let mut ledger = ledger_with(&[("t1", 500)]);
        let before = ledger.clone();

        let err = ledger.remove("missing").unwrap_err();

        assert_eq!(err, LedgerError::UnknownId("missing".into()));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_remove_then_readd_same_id() {
        let mut ledger = ledger_with(&[("t1", 500)]);
        assert_eq!(ledger.remove("t1"), Ok(500));
        assert!(ledger.is_empty());

        ledger.add("t1".into(), 42).unwrap();
        assert_eq!(ledger.get("t1"), Some(42));
    }

    #[test]
    fn test_add_accepts_non_positive_amounts() {
        // Validation happens at check time, not here.
        let ledger = ledger_with(&[("refund", -2000), ("zero", 0)]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("refund"), Some(-2000));
    }

    #[test]
    fn test_serde_roundtrip_keeps_initial_balance() {
        let ledger = ledger_with(&[("t1", 500), ("t2", 25)]);
        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains("\"initial_balance\":1000"));

        let back: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }
}
