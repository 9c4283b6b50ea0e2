//! In-process engine backed by libz3 through the `z3` crate.
//!
//! Declarations and assertions are recorded as they arrive. Each `check`
//! opens a fresh z3 context, translates them, solves and copies the model
//! out, so the engine holds no z3 handles between calls and stays `Send`.
use serde::{Deserialize, Serialize};

#[cfg(feature = "z3")]
use super::{Model, SatResult, SolverEngine, SolverError};
#[cfg(feature = "z3")]
use crate::model::{Constraint, Integer, LinearExpr, Relation, Var};
#[cfg(feature = "z3")]
use tracing::{debug, warn};
#[cfg(feature = "z3")]
use z3::{
    ast::{Ast, Bool, Int},
    Config, Context, Params, Solver,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Z3Config {
    /// Solver `timeout` parameter in milliseconds. `0` disables it.
    pub timeout_ms: u32,
}

impl Default for Z3Config {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

#[cfg(feature = "z3")]
#[derive(Debug, Clone, Default)]
pub struct Z3Engine {
    config: Z3Config,
    names: Vec<String>,
    constraints: Vec<Constraint>,
    model: Option<Model>,
}

#[cfg(feature = "z3")]
fn numeral<'ctx>(ctx: &'ctx Context, value: Integer) -> Result<Int<'ctx>, SolverError> {
    match i64::try_from(value) {
        Ok(small) => Ok(Int::from_i64(ctx, small)),
        Err(_) => Int::from_str(ctx, &value.to_string())
            .ok_or_else(|| SolverError::ExecutionFailed(format!("z3 rejected numeral {}", value))),
    }
}

/// Reads a model value printed as `123` or `(- 123)`.
#[cfg(feature = "z3")]
fn read_numeral(text: &str) -> Option<Integer> {
    let text = text.trim();
    match text.strip_prefix("(-").and_then(|t| t.strip_suffix(')')) {
        Some(magnitude) => magnitude.trim().parse::<Integer>().ok()?.checked_neg(),
        None => text.parse().ok(),
    }
}

#[cfg(feature = "z3")]
fn translate_expr<'ctx>(
    ctx: &'ctx Context,
    vars: &[Int<'ctx>],
    expr: &LinearExpr,
) -> Result<Int<'ctx>, SolverError> {
    let mut parts = Vec::with_capacity(expr.terms().len() + 1);
    for &(var, coefficient) in expr.terms() {
        let x = vars.get(var.index()).ok_or(SolverError::UnknownVariable(var))?;
        parts.push(match coefficient {
            1 => x.clone(),
            c => Int::mul(ctx, &[&numeral(ctx, c)?, x]),
        });
    }
    if expr.constant_part() != 0 || parts.is_empty() {
        parts.push(numeral(ctx, expr.constant_part())?);
    }
    let refs: Vec<&Int<'ctx>> = parts.iter().collect();
    Ok(Int::add(ctx, &refs))
}

#[cfg(feature = "z3")]
fn translate<'ctx>(
    ctx: &'ctx Context,
    vars: &[Int<'ctx>],
    constraint: &Constraint,
) -> Result<Bool<'ctx>, SolverError> {
    let lhs = translate_expr(ctx, vars, &constraint.lhs)?;
    let rhs = translate_expr(ctx, vars, &constraint.rhs)?;
    Ok(match constraint.relation {
        Relation::Eq => lhs._eq(&rhs),
        Relation::Le => lhs.le(&rhs),
        Relation::Lt => lhs.lt(&rhs),
        Relation::Ge => lhs.ge(&rhs),
        Relation::Gt => lhs.gt(&rhs),
    })
}

#[cfg(feature = "z3")]
impl Z3Engine {
    pub fn new(config: Z3Config) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn config(&self) -> &Z3Config { &self.config }

    fn solve(&self) -> Result<(SatResult, Option<Model>), SolverError> {
        let mut cfg = Config::new();
        cfg.set_model_generation(true);
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        if self.config.timeout_ms > 0 {
            let mut params = Params::new(&ctx);
            params.set_u32("timeout", self.config.timeout_ms);
            solver.set_params(&params);
        }

        let vars: Vec<Int> = (0..self.names.len())
            .map(|idx| Int::new_const(&ctx, format!("v{}", idx)))
            .collect();
        for constraint in &self.constraints {
            solver.assert(&translate(&ctx, &vars, constraint)?);
        }
        debug!(variables = vars.len(), assertions = self.constraints.len(), "Running z3");

        match solver.check() {
            z3::SatResult::Unsat => Ok((SatResult::Unsat, None)),
            z3::SatResult::Unknown => {
                let reason = solver.get_reason_unknown().unwrap_or_else(|| "unknown".to_string());
                if reason.contains("timeout") || reason.contains("canceled") {
                    return Err(SolverError::Timeout(u64::from(self.config.timeout_ms)));
                }
                Ok((SatResult::Unknown(reason), None))
            }
            z3::SatResult::Sat => {
                let found = solver
                    .get_model()
                    .ok_or_else(|| SolverError::NoModel("z3 answered sat without a model".into()))?;
                let mut model = Model::new();
                for (idx, (x, name)) in vars.iter().zip(&self.names).enumerate() {
                    let value = found
                        .eval(x, true)
                        .and_then(|v| v.as_i64().map(Integer::from).or_else(|| read_numeral(&v.to_string())))
                        .ok_or_else(|| SolverError::MissingValue(name.clone()))?;
                    model.insert(Var::new(idx), value);
                }
                Ok((SatResult::Sat, Some(model)))
            }
        }
    }
}

#[cfg(feature = "z3")]
impl SolverEngine for Z3Engine {
    fn declare_int(&mut self, name: &str) -> Var {
        let var = Var::new(self.names.len());
        self.names.push(name.to_string());
        var
    }

    fn assert(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        if let Some(var) = constraint.vars().find(|v| v.index() >= self.names.len()) {
            return Err(SolverError::UnknownVariable(var));
        }
        self.constraints.push(constraint.clone());
        self.model = None;
        Ok(())
    }

    fn reset(&mut self) {
        self.names.clear();
        self.constraints.clear();
        self.model = None;
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        self.model = None;
        let (result, model) = self.solve()?;
        if let SatResult::Unknown(reason) = &result {
            warn!(%reason, "z3 could not decide");
        }
        self.model = model;
        Ok(result)
    }

    fn model(&self) -> Result<Model, SolverError> {
        self.model
            .clone()
            .ok_or_else(|| SolverError::NoModel("last check was not satisfiable".into()))
    }
}
