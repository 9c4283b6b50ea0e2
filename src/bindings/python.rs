use crate::config::SolverSettings;
use crate::model::Integer;
use crate::solver::SmtlibConfig;
use crate::store::{Amount, LedgerError};
use crate::verifier::Account;
use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: LedgerError) -> PyErr {
    match e {
        LedgerError::DuplicateId(_) => PyValueError::new_err(e.to_string()),
        LedgerError::UnknownId(_) => PyKeyError::new_err(e.to_string()),
    }
}

#[pyclass(name = "Account")]
#[derive(Debug, Clone)]
pub struct PyAccount {
    inner: Account,
    solver: SolverSettings,
}

#[pymethods]
impl PyAccount {
    /// `solver_binary` selects an external SMT-LIB solver; the default is
    /// the in-process engine.
    #[new]
    #[pyo3(signature = (initial_balance, solver_binary=None))]
    pub fn new(initial_balance: Amount, solver_binary: Option<String>) -> Self {
        let solver = match solver_binary {
            Some(binary) => SolverSettings::Smtlib(SmtlibConfig { binary, ..Default::default() }),
            None => SolverSettings::default(),
        };
        Self { inner: Account::new(initial_balance), solver }
    }

    #[getter]
    pub fn initial_balance(&self) -> Amount {
        self.inner.ledger().initial_balance()
    }

    pub fn add_transaction(&mut self, txn_id: String, amount: Amount) -> PyResult<()> {
        self.inner.add_transaction(txn_id, amount).map_err(to_py_err)
    }

    pub fn remove_transaction(&mut self, txn_id: &str) -> PyResult<Amount> {
        self.inner.remove_transaction(txn_id).map_err(to_py_err)
    }

    /// Returns `(True, balance)` or `(False, None)`.
    pub fn check_constraints(&self) -> PyResult<(bool, Option<Integer>)> {
        let mut engine = self
            .solver
            .build_engine()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        let verdict = self
            .inner
            .check(&mut *engine)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok((verdict.is_satisfiable(), verdict.balance()))
    }

    pub fn diagnose(&self) -> Vec<String> {
        self.inner.diagnose().iter().map(|v| v.to_string()).collect()
    }

    pub fn to_smtlib(&self) -> String {
        self.inner.constraints().to_smtlib()
    }

    pub fn snapshot_json(&self) -> PyResult<String> {
        self.inner
            .snapshot_json()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    fn __len__(&self) -> usize {
        self.inner.ledger().len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Account(initial_balance={}, transactions={})",
            self.inner.ledger().initial_balance(),
            self.inner.ledger().len()
        )
    }
}
