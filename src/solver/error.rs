//! Failures of a solving engine. An unsatisfiable constraint set is a
//! normal answer and never shows up here.
use crate::model::Var;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("Solver unavailable: {0}")]
    Unavailable(String),
    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Solver timed out after {0}ms")]
    Timeout(u64),
    #[error("Failed to parse solver output: {0}")]
    Parse(String),
    #[error("Solver could not decide satisfiability: {0}")]
    Inconclusive(String),
    #[error("No model available: {0}")]
    NoModel(String),
    #[error("Model has no value for '{0}'")]
    MissingValue(String),
    #[error("Variable {0:?} was never declared")]
    UnknownVariable(Var),
}
