//! The derived arithmetic model of a ledger snapshot.
use super::expr::{Constraint, LinearExpr, Var};
use crate::store::TransactionId;
use serde::Serialize;
use std::fmt::{self, Write};

/// Which account invariant an assertion encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Invariant {
    /// `balance >= 0`
    NonNegativeBalance,
    /// `txn_<id> = amount`
    AmountBinding(TransactionId),
    /// `txn_<id> > 0`
    PositiveAmount(TransactionId),
    /// `balance = initial_balance + Σ amounts`
    BalanceEquation,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invariant::NonNegativeBalance => write!(f, "balance must not be negative"),
            Invariant::AmountBinding(id) => write!(f, "transaction '{}' is bound to its amount", id),
            Invariant::PositiveAmount(id) => write!(f, "transaction '{}' must have a positive amount", id),
            Invariant::BalanceEquation => write!(f, "balance equals initial balance plus all transactions"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    pub invariant: Invariant,
    pub constraint: Constraint,
}

/// Variables and labelled assertions derived from one ledger snapshot.
///
/// A set is never patched: every ledger mutation produces a new one via
/// [`build_constraint_set`](super::build_constraint_set).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConstraintSet {
    variables: Vec<String>,
    assertions: Vec<Assertion>,
    pub(super) balance: Var,
}

impl ConstraintSet {
    pub fn declare_int(&mut self, name: impl Into<String>) -> Var {
        let var = Var::new(self.variables.len());
        self.variables.push(name.into());
        var
    }

    pub fn assert(&mut self, invariant: Invariant, constraint: Constraint) {
        self.assertions.push(Assertion { invariant, constraint });
    }

    pub fn balance(&self) -> Var { self.balance }
    pub fn variables(&self) -> &[String] { &self.variables }
    pub fn assertions(&self) -> &[Assertion] { &self.assertions }

    pub fn var_name(&self, var: Var) -> Option<&str> {
        self.variables.get(var.index()).map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<Var> {
        self.variables.iter().position(|n| n == name).map(Var::new)
    }

    /// A standalone SMT-LIB2 script for this set, ending in `(check-sat)`
    /// and `(get-model)`.
    pub fn to_smtlib(&self) -> String {
        let constraints: Vec<&Constraint> = self.assertions.iter().map(|a| &a.constraint).collect();
        crate::solver::smtlib::render_script(&self.variables, &constraints)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    fn format_expr(&self, expr: &LinearExpr) -> String {
        let mut out = String::new();
        for &(var, coefficient) in expr.terms() {
            let name = self.var_name(var).unwrap_or("?");
            let sep = if out.is_empty() { "" } else { " + " };
            match coefficient {
                1 => { let _ = write!(out, "{}{}", sep, name); }
                c => { let _ = write!(out, "{}{}*{}", sep, c, name); }
            }
        }
        if out.is_empty() {
            out = expr.constant_part().to_string();
        } else if expr.constant_part() != 0 {
            let _ = write!(out, " + {}", expr.constant_part());
        }
        out
    }

    pub fn format_constraint(&self, constraint: &Constraint) -> String {
        format!(
            "{} {} {}",
            self.format_expr(&constraint.lhs),
            constraint.relation,
            self.format_expr(&constraint.rhs)
        )
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for assertion in &self.assertions {
            writeln!(f, "{}", self.format_constraint(&assertion.constraint))?;
        }
        Ok(())
    }
}
