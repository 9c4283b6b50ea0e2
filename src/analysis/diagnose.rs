//! Explains an unsatisfiable verdict by naming the broken invariants.
use crate::model::{Assertion, ConstraintSet, Integer, Invariant, Relation, Var};
use serde::Serialize;
use std::fmt;

/// One assertion that does not hold under the set's implied assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub invariant: Invariant,
    /// The assertion, rendered with variable names.
    pub constraint: String,
    /// Values of the variables the assertion mentions.
    pub values: Vec<(String, Integer)>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.constraint)?;
        if !self.values.is_empty() {
            let shown: Vec<String> = self.values.iter().map(|(n, v)| format!("{} = {}", n, v)).collect();
            write!(f, " (with {})", shown.join(", "))?;
        }
        Ok(())
    }
}

/// Assigns every variable that an equality `var = <closed expression>`
/// determines, repeating until nothing new is learned.
fn implied_assignment(set: &ConstraintSet) -> Vec<Option<Integer>> {
    let mut values: Vec<Option<Integer>> = vec![None; set.variables().len()];
    loop {
        let mut progressed = false;
        for Assertion { constraint, .. } in set.assertions() {
            if constraint.relation != Relation::Eq {
                continue;
            }
            let [(var, 1)] = constraint.lhs.terms() else { continue };
            if !matches!(values.get(var.index()), Some(None)) {
                continue;
            }
            let value = constraint.rhs.evaluate(|v| values.get(v.index()).copied().flatten());
            if let Some(constant) = value.and_then(|x| x.checked_sub(constraint.lhs.constant_part())) {
                values[var.index()] = Some(constant);
                progressed = true;
            }
        }
        if !progressed {
            return values;
        }
    }
}

/// Evaluates each assertion under the values its equalities imply and
/// returns the ones that fail. Empty means the set is satisfiable.
///
/// Assertions whose variables stay undetermined are skipped.
pub fn diagnose(set: &ConstraintSet) -> Vec<Violation> {
    let values = implied_assignment(set);
    let lookup = |v: Var| values.get(v.index()).copied().flatten();

    let mut violations = Vec::new();
    for assertion in set.assertions() {
        if assertion.constraint.holds_under(lookup) != Some(false) {
            continue;
        }
        let mut mentioned: Vec<Var> = assertion.constraint.vars().collect();
        mentioned.sort();
        mentioned.dedup();
        violations.push(Violation {
            invariant: assertion.invariant.clone(),
            constraint: set.format_constraint(&assertion.constraint),
            values: mentioned
                .into_iter()
                .filter_map(|v| Some((set.var_name(v)?.to_string(), lookup(v)?)))
                .collect(),
        });
    }
    violations
}
