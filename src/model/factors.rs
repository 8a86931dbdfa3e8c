//! Factors: unary costs and linear constraints over indicator variables.
//!
//! The set of factor kinds is closed. Every consumer (the ILP adapter, the
//! assignment checker) matches on [`Factor`] exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::variables::VarId;
use crate::common::FEASIBILITY_TOLERANCE;

/// Relation of a linear constraint's left-hand side to its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Le,
    Eq,
    Ge,
}

impl Relation {
    /// `lhs <relation> rhs` up to [`FEASIBILITY_TOLERANCE`].
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Relation::Le => lhs <= rhs + FEASIBILITY_TOLERANCE,
            Relation::Eq => (lhs - rhs).abs() <= FEASIBILITY_TOLERANCE,
            Relation::Ge => lhs >= rhs - FEASIBILITY_TOLERANCE,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Le => "<=",
            Relation::Eq => "==",
            Relation::Ge => ">=",
        })
    }
}

/// A cost or constraint term over a fixed, ordered list of variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Factor {
    /// Cost of one variable being true or false.
    UnaryCost {
        var: VarId,
        cost_true: f64,
        cost_false: f64,
    },
    /// At most one of `vars` may be true.
    ConflictConstraint { vars: Vec<VarId> },
    /// `sum(coefficients[i] * vars[i]) <relation> rhs`.
    WeightedSumConstraint {
        vars: Vec<VarId>,
        coefficients: Vec<f64>,
        relation: Relation,
        rhs: f64,
    },
}

impl Factor {
    /// Unary cost that is zero when the variable is false.
    pub fn cost(var: VarId, cost: f64) -> Self {
        Factor::UnaryCost {
            var,
            cost_true: cost,
            cost_false: 0.0,
        }
    }

    /// Variables in factor order.
    pub fn variables(&self) -> &[VarId] {
        match self {
            Factor::UnaryCost { var, .. } => std::slice::from_ref(var),
            Factor::ConflictConstraint { vars } => vars,
            Factor::WeightedSumConstraint { vars, .. } => vars,
        }
    }

    #[inline]
    pub fn is_constraint(&self) -> bool {
        !matches!(self, Factor::UnaryCost { .. })
    }

    /// Left-hand side, relation and right-hand side of a constraint factor under `value`.
    ///
    /// Returns `None` for cost factors.
    pub fn activity(&self, value: impl Fn(VarId) -> bool) -> Option<(f64, Relation, f64)> {
        match self {
            Factor::UnaryCost { .. } => None,
            Factor::ConflictConstraint { vars } => {
                let lhs = vars.iter().filter(|&&v| value(v)).count() as f64;
                Some((lhs, Relation::Le, 1.0))
            }
            Factor::WeightedSumConstraint {
                vars,
                coefficients,
                relation,
                rhs,
            } => {
                let lhs = vars
                    .iter()
                    .zip(coefficients)
                    .filter(|(&v, _)| value(v))
                    .map(|(_, &c)| c)
                    .sum();
                Some((lhs, *relation, *rhs))
            }
        }
    }
}

/// A constraint factor that an assignment does not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConstraintViolation {
    pub factor: usize,
    pub lhs: f64,
    pub relation: Relation,
    pub rhs: f64,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "factor {} violated: {} {} {} does not hold",
            self.factor, self.lhs, self.relation, self.rhs
        )
    }
}
