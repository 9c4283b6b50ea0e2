//! Translates a ledger snapshot into a complete constraint set.
use super::constraint_set::{ConstraintSet, Invariant};
use super::expr::{Constraint, Integer, LinearExpr};
use crate::store::Ledger;

pub const BALANCE_VAR: &str = "balance";
pub const TXN_VAR_PREFIX: &str = "txn_";

/// Derives the constraint set for the given ledger, from scratch.
///
/// Each transaction gets its own variable pinned to its amount and required
/// to be positive. The balance equation sums the literal amounts, so the
/// per-transaction variables only show up in the witness.
pub fn build_constraint_set(ledger: &Ledger) -> ConstraintSet {
    let mut set = ConstraintSet::default();

    let balance = set.declare_int(BALANCE_VAR);
    set.balance = balance;
    set.assert(Invariant::NonNegativeBalance, Constraint::at_least(balance, LinearExpr::constant(0)));

    let mut accumulated = LinearExpr::constant(ledger.initial_balance() as Integer);
    for txn in ledger.transactions() {
        let amount = txn.amount as Integer;
        let var = set.declare_int(format!("{}{}", TXN_VAR_PREFIX, txn.id));
        set.assert(
            Invariant::AmountBinding(txn.id.clone()),
            Constraint::equal(var, LinearExpr::constant(amount)),
        );
        set.assert(
            Invariant::PositiveAmount(txn.id),
            Constraint::greater_than(var, LinearExpr::constant(0)),
        );
        accumulated.add_constant(amount);
    }

    set.assert(Invariant::BalanceEquation, Constraint::equal(balance, accumulated));
    set
}
