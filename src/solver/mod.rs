//! The solving-engine seam and the engines shipped with the crate.
//!
//! The verifier only talks to [`SolverEngine`]; which engine answers is the
//! caller's choice, see [`crate::config::SolverSettings`].
mod error;
pub mod linear;
pub mod smtlib;
pub mod z3_engine;

pub use error::SolverError;
pub use linear::LinearEngine;
pub use smtlib::{SmtlibConfig, SmtlibEngine};
pub use z3_engine::Z3Config;
#[cfg(feature = "z3")]
pub use z3_engine::Z3Engine;

use crate::model::{Constraint, Integer, Var};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The engine gave up; the payload says why.
    Unknown(String),
}

/// Variable assignment produced by a satisfiable check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<Var, Integer>,
}

impl Model {
    pub fn new() -> Self { Self::default() }
    pub fn get(&self, var: Var) -> Option<Integer> { self.values.get(&var).copied() }
    pub fn insert(&mut self, var: Var, value: Integer) { self.values.insert(var, value); }
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (Var, Integer)> + '_ {
        self.values.iter().map(|(v, x)| (*v, *x))
    }
}

/// The capability surface the verifier needs from a constraint solver.
///
/// Assertions accumulate until [`reset`](SolverEngine::reset). A model is only
/// valid after [`check`](SolverEngine::check) answered [`SatResult::Sat`].
pub trait SolverEngine {
    fn declare_int(&mut self, name: &str) -> Var;
    fn assert(&mut self, constraint: &Constraint) -> Result<(), SolverError>;
    fn reset(&mut self);
    fn check(&mut self) -> Result<SatResult, SolverError>;
    fn model(&self) -> Result<Model, SolverError>;
}

impl<E: SolverEngine + ?Sized> SolverEngine for Box<E> {
    fn declare_int(&mut self, name: &str) -> Var { (**self).declare_int(name) }
    fn assert(&mut self, constraint: &Constraint) -> Result<(), SolverError> { (**self).assert(constraint) }
    fn reset(&mut self) { (**self).reset() }
    fn check(&mut self) -> Result<SatResult, SolverError> { (**self).check() }
    fn model(&self) -> Result<Model, SolverError> { (**self).model() }
}
