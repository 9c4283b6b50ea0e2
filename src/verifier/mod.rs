//! Keeps a ledger and its constraint set in lockstep and answers checks.
mod check;
mod verdict;

pub use check::check;
pub use verdict::{Verdict, Witness};

use crate::analysis::{self, Violation};
use crate::config::Settings;
use crate::model::{build_constraint_set, ConstraintSet};
use crate::solver::{SolverEngine, SolverError};
use crate::store::{Amount, Ledger, LedgerError, TransactionId};
use tracing::{debug, warn};

/// One account session: the authoritative ledger plus the constraint set
/// derived from its current state.
///
/// Every successful mutation rebuilds the constraint set before returning,
/// so the set always matches the ledger. A failed mutation changes nothing.
#[derive(Debug, Clone)]
pub struct Account {
    ledger: Ledger,
    constraints: ConstraintSet,
}

impl Account {
    pub fn new(initial_balance: Amount) -> Self {
        Self::from_ledger(Ledger::new(initial_balance))
    }

    pub fn from_ledger(ledger: Ledger) -> Self {
        let constraints = build_constraint_set(&ledger);
        Self { ledger, constraints }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.initial_balance)
    }

    pub fn ledger(&self) -> &Ledger { &self.ledger }
    pub fn constraints(&self) -> &ConstraintSet { &self.constraints }

    /// Records a transaction. Non-positive amounts are accepted here and
    /// only show up as an unsatisfiable check.
    pub fn add_transaction(&mut self, id: impl Into<TransactionId>, amount: Amount) -> Result<(), LedgerError> {
        let id = id.into();
        if let Err(e) = self.ledger.add(id.clone(), amount) {
            warn!(%id, "Rejected transaction: {}", e);
            return Err(e);
        }
        debug!(%id, amount, "Transaction added");
        self.rebuild();
        Ok(())
    }

    pub fn remove_transaction(&mut self, id: &str) -> Result<Amount, LedgerError> {
        let amount = self.ledger.remove(id).inspect_err(|e| {
            warn!(id, "Rejected removal: {}", e);
        })?;
        debug!(id, amount, "Transaction removed");
        self.rebuild();
        Ok(amount)
    }

    /// Solves the current constraint set on `engine`.
    pub fn check(&self, engine: &mut dyn SolverEngine) -> Result<Verdict, SolverError> {
        check(&self.constraints, engine)
    }

    /// Every invariant the current ledger breaks, in assertion order.
    pub fn diagnose(&self) -> Vec<Violation> {
        analysis::diagnose(&self.constraints)
    }

    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.ledger)
    }

    fn rebuild(&mut self) {
        self.constraints = build_constraint_set(&self.ledger);
        debug!(
            transactions = self.ledger.len(),
            assertions = self.constraints.assertions().len(),
            "Rebuilt constraint set"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::LinearEngine;

    #[test]
    fn test_failed_mutation_keeps_constraint_set() {
        let mut account = Account::new(1000);
        account.add_transaction("t1", 500).unwrap();
        let before = account.constraints().clone();

        assert!(account.add_transaction("t1", 7).is_err());
        assert!(account.remove_transaction("nope").is_err());

        assert_eq!(account.constraints(), &before);
    }

    #[test]
    fn test_set_matches_fresh_build_after_mutations() {
        let mut account = Account::new(100);
        account.add_transaction("a", 1).unwrap();
        account.add_transaction("b", -5).unwrap();
        account.add_transaction("c", 3).unwrap();
        account.remove_transaction("b").unwrap();
        account.remove_transaction("a").unwrap();
        account.add_transaction("a", 9).unwrap();

        assert_eq!(account.constraints(), &build_constraint_set(account.ledger()));
    }

    #[test]
    fn test_check_is_repeatable() {
        let mut account = Account::new(1000);
        account.add_transaction("t1", 500).unwrap();
        let mut engine = LinearEngine::new();

        let first = account.check(&mut engine).unwrap();
        let second = account.check(&mut engine).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.balance(), Some(1500));
    }

    #[test]
    fn test_snapshot_lists_transactions() {
        let mut account = Account::new(5);
        account.add_transaction("rent", 40).unwrap();
        let json = account.snapshot_json().unwrap();
        assert!(json.contains("\"rent\": 40"));
    }
}
