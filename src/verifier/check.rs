//! Submits a constraint set to a solving engine and reads the verdict back.
use super::verdict::{Verdict, Witness};
use crate::model::{ConstraintSet, Var};
use crate::solver::{SatResult, SolverEngine, SolverError};
use tracing::{debug, info};

/// Runs one satisfiability query for `set` on `engine`.
///
/// The engine is reset first, so nothing asserted by an earlier call can
/// leak into this one. `set` itself is only read.
pub fn check(set: &ConstraintSet, engine: &mut dyn SolverEngine) -> Result<Verdict, SolverError> {
    engine.reset();

    let handles: Vec<Var> = set.variables().iter().map(|name| engine.declare_int(name)).collect();
    for assertion in set.assertions() {
        let constraint = assertion.constraint.rebind(&handles).map_err(SolverError::UnknownVariable)?;
        engine.assert(&constraint)?;
    }
    debug!(
        variables = handles.len(),
        assertions = set.assertions().len(),
        "Submitted constraint set"
    );

    let verdict = match engine.check()? {
        SatResult::Sat => {
            let model = engine.model()?;
            let mut witness = Witness::new();
            for (name, handle) in set.variables().iter().zip(&handles) {
                let value = model
                    .get(*handle)
                    .ok_or_else(|| SolverError::MissingValue(name.clone()))?;
                witness.insert(name.clone(), value);
            }
            let balance_handle = handles
                .get(set.balance().index())
                .copied()
                .ok_or(SolverError::UnknownVariable(set.balance()))?;
            let balance = model
                .get(balance_handle)
                .ok_or_else(|| SolverError::MissingValue("balance".into()))?;
            Verdict::Satisfiable { balance, witness }
        }
        SatResult::Unsat => Verdict::Unsatisfiable,
        SatResult::Unknown(reason) => return Err(SolverError::Inconclusive(reason)),
    };

    info!(%verdict, "Constraint check finished");
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{build_constraint_set, Constraint, Invariant, LinearExpr};
    use crate::solver::{LinearEngine, Model};
    use crate::store::Ledger;

    /// Answers with a fixed result and an empty model.
    struct FixedEngine {
        result: SatResult,
        resets: usize,
        asserted: usize,
    }

    impl SolverEngine for FixedEngine {
        fn declare_int(&mut self, _name: &str) -> Var { Var(0) }
        fn assert(&mut self, _constraint: &Constraint) -> Result<(), SolverError> {
            self.asserted += 1;
            Ok(())
        }
        fn reset(&mut self) {
            self.resets += 1;
            self.asserted = 0;
        }
        fn check(&mut self) -> Result<SatResult, SolverError> { Ok(self.result.clone()) }
        fn model(&self) -> Result<Model, SolverError> { Ok(Model::new()) }
    }

    #[test]
    fn test_witness_covers_every_variable() {
        let mut ledger = Ledger::new(1000);
        ledger.add("t1".into(), 500).unwrap();
        ledger.add("t2".into(), 25).unwrap();
        let set = build_constraint_set(&ledger);

        let verdict = check(&set, &mut LinearEngine::new()).unwrap();

        assert_eq!(verdict.balance(), Some(1525));
        let witness = verdict.witness().unwrap();
        assert_eq!(witness.get("balance"), Some(&1525));
        assert_eq!(witness.get("txn_t1"), Some(&500));
        assert_eq!(witness.get("txn_t2"), Some(&25));
    }

    #[test]
    fn test_engine_is_reset_before_each_query() {
        let set = build_constraint_set(&Ledger::new(10));
        let mut engine = FixedEngine { result: SatResult::Unsat, resets: 0, asserted: 0 };

        check(&set, &mut engine).unwrap();
        check(&set, &mut engine).unwrap();

        assert_eq!(engine.resets, 2);
        assert_eq!(engine.asserted, set.assertions().len());
    }

    #[test]
    fn test_unknown_becomes_inconclusive_error() {
        let set = build_constraint_set(&Ledger::new(10));
        let mut engine = FixedEngine { result: SatResult::Unknown("gave up".into()), resets: 0, asserted: 0 };

        let err = check(&set, &mut engine).unwrap_err();
        assert_eq!(err, SolverError::Inconclusive("gave up".into()));
    }

    #[test]
    fn test_sat_without_values_reports_missing_value() {
        let set = build_constraint_set(&Ledger::new(10));
        let mut engine = FixedEngine { result: SatResult::Sat, resets: 0, asserted: 0 };

        let err = check(&set, &mut engine).unwrap_err();
        assert_eq!(err, SolverError::MissingValue("balance".into()));
    }

    #[test]
    fn test_set_without_variables_is_an_error() {
        let err = check(&ConstraintSet::default(), &mut LinearEngine::new()).unwrap_err();
        assert_eq!(err, SolverError::UnknownVariable(Var(0)));
    }

    #[test]
    fn test_undeclared_variable_is_an_error() {
        let mut set = ConstraintSet::default();
        set.declare_int("balance");
        set.assert(Invariant::BalanceEquation, Constraint::equal(Var(5), LinearExpr::constant(1)));

        let mut engine = FixedEngine { result: SatResult::Sat, resets: 0, asserted: 0 };
        assert_eq!(check(&set, &mut engine), Err(SolverError::UnknownVariable(Var(5))));
        assert_eq!(engine.asserted, 0);
    }

    #[test]
    fn test_verdict_json_shape() {
        let set = build_constraint_set(&Ledger::new(0));
        let verdict = check(&set, &mut LinearEngine::new()).unwrap();

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "SATISFIABLE");
        assert_eq!(json["balance"], 0);
        assert_eq!(serde_json::to_value(Verdict::Unsatisfiable).unwrap()["status"], "UNSATISFIABLE");
    }
}
