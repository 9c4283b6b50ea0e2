//! Linear integer expressions and the comparisons built from them.
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Arithmetic width used inside the constraint model. Wider than
/// [`Amount`](crate::store::Amount) so that summing many amounts cannot overflow.
pub type Integer = i128;

/// Handle of an integer variable, either inside a `ConstraintSet` or inside
/// a solving engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Var(pub u32);

impl Var {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self {
        debug_assert!(idx <= u32::MAX as usize, "variable index {} exceeds u32", idx);
        Self(idx as u32)
    }
}

/// `constant + Σ coefficient * var`, with unique vars and no zero coefficients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinearExpr {
    constant: Integer,
    terms: SmallVec<[(Var, Integer); 2]>,
}

impl LinearExpr {
    pub fn constant(value: Integer) -> Self {
        Self { constant: value, terms: SmallVec::new() }
    }

    pub fn var(var: Var) -> Self {
        let mut expr = Self::default();
        expr.add_term(var, 1);
        expr
    }

    pub fn constant_part(&self) -> Integer { self.constant }
    pub fn terms(&self) -> &[(Var, Integer)] { &self.terms }
    pub fn is_constant(&self) -> bool { self.terms.is_empty() }

    pub fn add_constant(&mut self, value: Integer) {
        self.constant += value;
    }

    pub fn add_term(&mut self, var: Var, coefficient: Integer) {
        if let Some(pos) = self.terms.iter().position(|(v, _)| *v == var) {
            self.terms[pos].1 += coefficient;
            if self.terms[pos].1 == 0 {
                self.terms.remove(pos);
            }
        } else if coefficient != 0 {
            self.terms.push((var, coefficient));
        }
    }

    /// `self - other`.
    pub fn minus(&self, other: &LinearExpr) -> LinearExpr {
        let mut out = self.clone();
        out.constant -= other.constant;
        for &(var, coefficient) in &other.terms {
            out.add_term(var, -coefficient);
        }
        out
    }

    /// Evaluates the expression, or `None` if a variable has no value or the
    /// arithmetic overflows.
    pub fn evaluate(&self, lookup: impl Fn(Var) -> Option<Integer>) -> Option<Integer> {
        self.terms.iter().try_fold(self.constant, |acc, &(var, coefficient)| {
            acc.checked_add(coefficient.checked_mul(lookup(var)?)?)
        })
    }

    /// Replaces every variable `v` with `map[v.index()]`. Fails with the
    /// first variable `map` has no entry for.
    pub fn rebind(&self, map: &[Var]) -> Result<LinearExpr, Var> {
        let terms = self
            .terms
            .iter()
            .map(|&(v, c)| map.get(v.index()).map(|&mapped| (mapped, c)).ok_or(v))
            .collect::<Result<_, _>>()?;
        Ok(LinearExpr { constant: self.constant, terms })
    }
}

impl From<Var> for LinearExpr {
    fn from(var: Var) -> Self { LinearExpr::var(var) }
}

impl From<Integer> for LinearExpr {
    fn from(value: Integer) -> Self { LinearExpr::constant(value) }
}

impl From<i64> for LinearExpr {
    fn from(value: i64) -> Self { LinearExpr::constant(value as Integer) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Relation {
    Eq,
    Le,
    Lt,
    Ge,
    Gt,
}

impl Relation {
    pub fn holds(&self, lhs: Integer, rhs: Integer) -> bool {
        match self {
            Relation::Eq => lhs == rhs,
            Relation::Le => lhs <= rhs,
            Relation::Lt => lhs < rhs,
            Relation::Ge => lhs >= rhs,
            Relation::Gt => lhs > rhs,
        }
    }

    /// Operator symbol, shared by `Display` and SMT-LIB output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Le => "<=",
            Relation::Lt => "<",
            Relation::Ge => ">=",
            Relation::Gt => ">",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A boolean proposition `lhs <relation> rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Constraint {
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: LinearExpr,
}

impl Constraint {
    pub fn new(lhs: impl Into<LinearExpr>, relation: Relation, rhs: impl Into<LinearExpr>) -> Self {
        Self { lhs: lhs.into(), relation, rhs: rhs.into() }
    }

    pub fn equal(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs, Relation::Eq, rhs)
    }

    pub fn at_least(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs, Relation::Ge, rhs)
    }

    pub fn greater_than(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs, Relation::Gt, rhs)
    }

    /// Moves everything to the left: `(lhs - rhs) <relation> 0`.
    pub fn normalized(&self) -> (LinearExpr, Relation) {
        (self.lhs.minus(&self.rhs), self.relation)
    }

    /// `None` if either side cannot be evaluated.
    pub fn holds_under(&self, lookup: impl Fn(Var) -> Option<Integer>) -> Option<bool> {
        let lhs = self.lhs.evaluate(&lookup)?;
        let rhs = self.rhs.evaluate(&lookup)?;
        Some(self.relation.holds(lhs, rhs))
    }

    pub fn rebind(&self, map: &[Var]) -> Result<Constraint, Var> {
        Ok(Constraint { lhs: self.lhs.rebind(map)?, relation: self.relation, rhs: self.rhs.rebind(map)? })
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.lhs.terms().iter().chain(self.rhs.terms()).map(|(v, _)| *v)
    }
}
