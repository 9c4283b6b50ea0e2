//! The constraint model: expressions, the derived constraint set, and the
//! builder that rebuilds it from a ledger.
pub mod builder;
pub mod constraint_set;
pub mod expr;

pub use builder::build_constraint_set;
pub use constraint_set::{Assertion, ConstraintSet, Invariant};
pub use expr::{Constraint, Integer, LinearExpr, Relation, Var};
