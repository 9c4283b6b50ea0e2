//! An in-process engine for linear integer constraints.
//!
//! Works in three passes over the normalized constraints `expr <rel> 0`:
//! 1. Pin variables through equalities that have exactly one unknown left,
//!    repeating until nothing changes.
//! 2. Check closed constraints, and turn constraints with one unknown into
//!    integer bounds on that unknown.
//! 3. Pick a value inside each remaining variable's bounds.
//!
//! Anything pinned in pass 1 is implied by the constraints, so every
//! contradiction found afterwards is a genuine `Unsat`. Constraints that
//! couple two or more unpinned variables are outside what this engine
//! decides; it answers `Unknown` for them.
use super::{Model, SatResult, SolverEngine, SolverError};
use crate::model::{Constraint, Integer, LinearExpr, Relation, Var};
use smallvec::SmallVec;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct LinearEngine {
    names: Vec<String>,
    constraints: Vec<(LinearExpr, Relation)>,
    model: Option<Model>,
}

enum Outcome {
    Sat(Model),
    Unsat,
    Unknown(String),
}

/// What is left of `expr` once the known values are substituted.
struct Residual {
    constant: Integer,
    unknowns: SmallVec<[(Var, Integer); 2]>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bounds {
    lo: Option<Integer>,
    hi: Option<Integer>,
}

impl Bounds {
    fn raise_lo(&mut self, value: Integer) {
        self.lo = Some(self.lo.map_or(value, |lo| lo.max(value)));
    }

    fn lower_hi(&mut self, value: Integer) {
        self.hi = Some(self.hi.map_or(value, |hi| hi.min(value)));
    }

    /// Applies `coefficient * x + constant <rel> 0`. `None` on overflow.
    fn restrict(
        &mut self,
        coefficient: Integer,
        constant: Integer,
        relation: Relation,
    ) -> Option<()> {
        // Strict relations over integers tighten by one.
        let (constant, relation) = match relation {
            Relation::Lt => (constant.checked_add(1)?, Relation::Le),
            Relation::Gt => (constant.checked_sub(1)?, Relation::Ge),
            other => (constant, other),
        };
        let rhs = constant.checked_neg()?;
        match relation {
            Relation::Le | Relation::Ge | Relation::Eq => {
                let upper = matches!(relation, Relation::Le | Relation::Eq);
                let lower = matches!(relation, Relation::Ge | Relation::Eq);
                // Dividing by a negative coefficient flips the direction.
                if upper {
                    if coefficient > 0 {
                        self.lower_hi(div_floor(rhs, coefficient)?);
                    } else {
                        self.raise_lo(div_ceil(rhs, coefficient)?);
                    }
                }
                if lower {
                    if coefficient > 0 {
                        self.raise_lo(div_ceil(rhs, coefficient)?);
                    } else {
                        self.lower_hi(div_floor(rhs, coefficient)?);
                    }
                }
            }
            Relation::Lt | Relation::Gt => unreachable!(),
        }
        Some(())
    }

    /// The value closest to zero inside the bounds, or `None` if they are empty.
    fn pick(&self) -> Option<Integer> {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if lo > hi => None,
            (Some(lo), _) if lo > 0 => Some(lo),
            (_, Some(hi)) if hi < 0 => Some(hi),
            _ => Some(0),
        }
    }
}

fn div_floor(n: Integer, d: Integer) -> Option<Integer> {
    let q = n.checked_div(d)?;
    if n % d != 0 && ((n < 0) != (d < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

fn div_ceil(n: Integer, d: Integer) -> Option<Integer> {
    let q = n.checked_div(d)?;
    if n % d != 0 && ((n < 0) == (d < 0)) {
        q.checked_add(1)
    } else {
        Some(q)
    }
}

fn residual(expr: &LinearExpr, values: &[Option<Integer>]) -> Option<Residual> {
    let mut constant = expr.constant_part();
    let mut unknowns = SmallVec::new();
    for &(var, coefficient) in expr.terms() {
        match values[var.index()] {
            Some(value) => constant = constant.checked_add(coefficient.checked_mul(value)?)?,
            None => unknowns.push((var, coefficient)),
        }
    }
    Some(Residual { constant, unknowns })
}

const OVERFLOW: &str = "integer overflow while propagating constraints";

impl LinearEngine {
    pub fn new() -> Self { Self::default() }

    fn solve(&self) -> Outcome {
        let mut values: Vec<Option<Integer>> = vec![None; self.names.len()];

        // --- Pass 1: equality propagation ---
        loop {
            let mut progressed = false;
            for (expr, relation) in &self.constraints {
                if *relation != Relation::Eq {
                    continue;
                }
                let Some(res) = residual(expr, &values) else {
                    return Outcome::Unknown(OVERFLOW.into());
                };
                if let [(var, coefficient)] = res.unknowns[..] {
                    match res.constant.checked_rem(coefficient) {
                        Some(0) => {}
                        Some(_) => return Outcome::Unsat,
                        None => return Outcome::Unknown(OVERFLOW.into()),
                    }
                    let value = res.constant.checked_neg().and_then(|c| c.checked_div(coefficient));
                    let Some(value) = value else {
                        return Outcome::Unknown(OVERFLOW.into());
                    };
                    trace!(var = %self.names[var.index()], value = %value, "Pinned by equality");
                    values[var.index()] = Some(value);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        // --- Pass 2: closed checks and single-variable bounds ---
        let mut bounds = vec![Bounds::default(); self.names.len()];
        for (expr, relation) in &self.constraints {
            let Some(res) = residual(expr, &values) else {
                return Outcome::Unknown(OVERFLOW.into());
            };
            match res.unknowns[..] {
                [] => {
                    if !relation.holds(res.constant, 0) {
                        return Outcome::Unsat;
                    }
                }
                [(var, coefficient)] => {
                    let restricted = bounds[var.index()].restrict(coefficient, res.constant, *relation);
                    if restricted.is_none() {
                        return Outcome::Unknown(OVERFLOW.into());
                    }
                }
                _ => {
                    return Outcome::Unknown(format!(
                        "constraint couples {} unpinned variables",
                        res.unknowns.len()
                    ));
                }
            }
        }

        // --- Pass 3: choose free values ---
        let mut model = Model::new();
        for (idx, slot) in values.iter().enumerate() {
            let value = match slot {
                Some(v) => *v,
                None => match bounds[idx].pick() {
                    Some(v) => v,
                    None => return Outcome::Unsat,
                },
            };
            model.insert(Var::new(idx), value);
        }
        Outcome::Sat(model)
    }
}

impl SolverEngine for LinearEngine {
    fn declare_int(&mut self, name: &str) -> Var {
        let var = Var::new(self.names.len());
        self.names.push(name.to_string());
        var
    }

    fn assert(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        if let Some(var) = constraint.vars().find(|v| v.index() >= self.names.len()) {
            return Err(SolverError::UnknownVariable(var));
        }
        self.constraints.push(constraint.normalized());
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
        Ok(match self.solve() {
            Outcome::Sat(model) => {
                self.model = Some(model);
                SatResult::Sat
            }
            Outcome::Unsat => SatResult::Unsat,
            Outcome::Unknown(reason) => SatResult::Unknown(reason),
        })
    }

    fn model(&self) -> Result<Model, SolverError> {
        self.model
            .clone()
            .ok_or_else(|| SolverError::NoModel("last check was not satisfiable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn c(value: Integer) -> LinearExpr { LinearExpr::constant(value) }

    #[test]
    fn test_chained_equalities_are_pinned() {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        let y = engine.declare_int("y");
        // y = x + 3, x = 4
        let mut x_plus_3 = LinearExpr::var(x);
        x_plus_3.add_constant(3);
        engine.assert(&Constraint::equal(y, x_plus_3)).unwrap();
        engine.assert(&Constraint::equal(x, c(4))).unwrap();

        assert_eq!(engine.check(), Ok(SatResult::Sat));
        let model = engine.model().unwrap();
        assert_eq!(model.get(x), Some(4));
        assert_eq!(model.get(y), Some(7));
    }

    #[test]
    fn test_contradicting_bound_is_unsat() {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        engine.assert(&Constraint::equal(x, c(-5))).unwrap();
        engine.assert(&Constraint::greater_than(x, c(0))).unwrap();

        assert_eq!(engine.check(), Ok(SatResult::Unsat));
        assert!(matches!(engine.model(), Err(SolverError::NoModel(_))));
    }

    #[test]
    fn test_non_divisible_equality_is_unsat() {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        let mut two_x = LinearExpr::default();
        two_x.add_term(x, 2);
        engine.assert(&Constraint::equal(two_x, c(3))).unwrap();

        assert_eq!(engine.check(), Ok(SatResult::Unsat));
    }

    #[rstest]
    #[case(Relation::Gt, 10, 11)]
    #[case(Relation::Ge, 10, 10)]
    #[case(Relation::Lt, -10, -11)]
    #[case(Relation::Le, 5, 0)]
    #[case(Relation::Ge, -3, 0)]
    fn test_free_variable_picks_closest_to_zero(
        #[case] rel: Relation,
        #[case] bound: Integer,
        #[case] expected: Integer,
    ) {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        engine.assert(&Constraint::new(x, rel, c(bound))).unwrap();

        assert_eq!(engine.check(), Ok(SatResult::Sat));
        assert_eq!(engine.model().unwrap().get(x), Some(expected));
    }

    #[test]
    fn test_negative_coefficient_flips_bound() {
        // -3x >= 7  =>  x <= -3
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        let mut expr = LinearExpr::default();
        expr.add_term(x, -3);
        engine.assert(&Constraint::at_least(expr, c(7))).unwrap();

        assert_eq!(engine.check(), Ok(SatResult::Sat));
        assert_eq!(engine.model().unwrap().get(x), Some(-3));
    }

    #[test]
    fn test_empty_interval_is_unsat() {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        engine.assert(&Constraint::greater_than(x, c(5))).unwrap();
        engine.assert(&Constraint::new(x, Relation::Lt, c(6))).unwrap();

        assert_eq!(engine.check(), Ok(SatResult::Unsat));
    }

    #[test]
    fn test_coupled_free_variables_are_unknown() {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        let y = engine.declare_int("y");
        engine.assert(&Constraint::greater_than(x, LinearExpr::var(y))).unwrap();

        assert!(matches!(engine.check(), Ok(SatResult::Unknown(_))));
    }

    #[test]
    fn test_undeclared_variable_is_rejected() {
        let mut engine = LinearEngine::new();
        let err = engine.assert(&Constraint::equal(Var(2), c(1))).unwrap_err();
        assert_eq!(err, SolverError::UnknownVariable(Var(2)));
    }

    #[test]
    fn test_reset_clears_previous_assertions() {
        let mut engine = LinearEngine::new();
        let x = engine.declare_int("x");
        engine.assert(&Constraint::equal(x, c(-1))).unwrap();
        engine.assert(&Constraint::at_least(x, c(0))).unwrap();
        assert_eq!(engine.check(), Ok(SatResult::Unsat));

        engine.reset();
        let x = engine.declare_int("x");
        engine.assert(&Constraint::equal(x, c(1))).unwrap();
        assert_eq!(engine.check(), Ok(SatResult::Sat));
        assert_eq!(engine.model().unwrap().len(), 1);
    }
}
