//! Settings for an account session and the engine that checks it.

use crate::solver::{LinearEngine, SmtlibConfig, SmtlibEngine, SolverEngine, SolverError, Z3Config};
use crate::store::Amount;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Which engine answers checks.
///
/// The default is z3 when the crate is built with the `z3` feature and the
/// builtin engine otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SolverSettings {
    /// libz3 linked in-process, see [`Z3Config`].
    Z3(Z3Config),
    /// External SMT-LIB2 solver, see [`SmtlibConfig`].
    Smtlib(SmtlibConfig),
    /// [`LinearEngine`], for builds without libz3.
    Builtin,
}

impl Default for SolverSettings {
    fn default() -> Self {
        if cfg!(feature = "z3") {
            SolverSettings::Z3(Z3Config::default())
        } else {
            SolverSettings::Builtin
        }
    }
}

impl SolverSettings {
    /// Fails with [`SolverError::Unavailable`] when z3 is selected but not
    /// compiled in.
    pub fn build_engine(&self) -> Result<Box<dyn SolverEngine + Send>, SolverError> {
        match self {
            #[cfg(feature = "z3")]
            SolverSettings::Z3(config) => Ok(Box::new(crate::solver::Z3Engine::new(config.clone()))),
            #[cfg(not(feature = "z3"))]
            SolverSettings::Z3(_) => Err(SolverError::Unavailable(
                "z3 backend requested but the crate was built without the `z3` feature".into(),
            )),
            SolverSettings::Smtlib(config) => Ok(Box::new(SmtlibEngine::new(config.clone()))),
            SolverSettings::Builtin => Ok(Box::new(LinearEngine::new())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Opening balance of the account.
    pub initial_balance: Amount,
    pub solver: SolverSettings,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Applies `TALLY_INITIAL_BALANCE` and `TALLY_SOLVER_BINARY` from the
    /// process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`with_env_overrides`](Self::with_env_overrides) with an
    /// arbitrary lookup. Setting a solver binary switches to the SMT-LIB
    /// backend.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup("TALLY_INITIAL_BALANCE") {
            self.initial_balance = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TALLY_INITIAL_BALANCE".into(),
                value: raw.clone(),
            })?;
        }
        if let Some(binary) = lookup("TALLY_SOLVER_BINARY") {
            let mut config = match std::mem::take(&mut self.solver) {
                SolverSettings::Smtlib(config) => config,
                SolverSettings::Z3(_) | SolverSettings::Builtin => SmtlibConfig::default(),
            };
            config.binary = binary;
            self.solver = SolverSettings::Smtlib(config);
        }
        Ok(self)
    }
}
