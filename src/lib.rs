//! Verifies a single account ledger by rebuilding an arithmetic constraint
//! model after every mutation and asking a solving engine whether a
//! consistent state exists.
//!
//! [`verifier::Account`] is the entry point: it owns the [`store::Ledger`],
//! keeps the derived [`model::ConstraintSet`] in sync, and checks it on any
//! [`solver::SolverEngine`].

pub mod analysis;
pub mod config;
pub mod model;
pub mod solver;
pub mod store;
pub mod verifier;

#[cfg(feature = "python")]
mod bindings {
    pub mod python;
}

pub use config::{ConfigError, Settings, SolverSettings};
pub use model::{build_constraint_set, ConstraintSet};
pub use solver::{LinearEngine, SmtlibEngine, SolverEngine, SolverError};
#[cfg(feature = "z3")]
pub use solver::Z3Engine;
pub use store::{Amount, Ledger, LedgerError, TransactionId};
pub use verifier::{Account, Verdict};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Version of the compiled core, for checking the bridge from Python.
#[cfg(feature = "python")]
#[pyfunction]
fn rust_core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Defines the `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Honour RUST_LOG; keep any subscriber the host already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    m.add_function(wrap_pyfunction!(rust_core_version, m)?)?;
    m.add_class::<bindings::python::PyAccount>()?;
    Ok(())
}
