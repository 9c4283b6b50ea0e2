//! The answer of a satisfiability check.
use crate::model::Integer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Variable name to value, as assigned by the engine.
pub type Witness = BTreeMap<String, Integer>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Satisfiable { balance: Integer, witness: Witness },
    Unsatisfiable,
}

impl Verdict {
    pub fn is_satisfiable(&self) -> bool { matches!(self, Verdict::Satisfiable { .. }) }

    /// The witness balance, if any.
    pub fn balance(&self) -> Option<Integer> {
        match self {
            Verdict::Satisfiable { balance, .. } => Some(*balance),
            Verdict::Unsatisfiable => None,
        }
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            Verdict::Satisfiable { witness, .. } => Some(witness),
            Verdict::Unsatisfiable => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Satisfiable { balance, .. } => write!(f, "SATISFIABLE (balance = {})", balance),
            Verdict::Unsatisfiable => write!(f, "UNSATISFIABLE"),
        }
    }
}
