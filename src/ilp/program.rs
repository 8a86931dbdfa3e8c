//! Generic 0/1 linear program and the backend capability that solves it.
//!
//! ```text
//! minimize    constant + sum_i objective[i] * x_i
//! subject to  sum_j a_j * x_j  {<=, ==, >=}  b     for every constraint
//!             x_i in {0, 1}
//! ```

use serde::Serialize;

use crate::common::FEASIBILITY_TOLERANCE;
use crate::errors::SolverError;
use crate::model::Relation;

/// One constraint row. Variable indices are unique within a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearConstraint {
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    /// Left-hand side under `values`.
    pub fn activity(&self, values: &[bool]) -> f64 {
        self.terms
            .iter()
            .filter(|(j, _)| values.get(*j).copied().unwrap_or(false))
            .map(|(_, a)| a)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        self.relation.holds(self.activity(values), self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryProgram {
    num_vars: usize,
    objective: Vec<f64>,
    constant: f64,
    constraints: Vec<LinearConstraint>,
}

impl BinaryProgram {
    /// Program over `num_vars` variables with a zero objective and no constraints.
    pub fn new(num_vars: usize) -> Self {
        Self {
            num_vars,
            objective: vec![0.0; num_vars],
            constant: 0.0,
            constraints: Vec::new(),
        }
    }

    /// Add `cost` to the objective coefficient of `var`.
    ///
    /// Panics if `var` is out of range.
    pub fn add_cost(&mut self, var: usize, cost: f64) {
        self.objective[var] += cost;
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add a constraint; repeated variables have their coefficients summed.
    ///
    /// Terms are stored in ascending variable order, zero coefficients dropped.
    pub fn add_constraint(
        &mut self,
        terms: impl IntoIterator<Item = (usize, f64)>,
        relation: Relation,
        rhs: f64,
    ) {
        let mut sorted: Vec<(usize, f64)> = terms.into_iter().collect();
        sorted.sort_by_key(|&(j, _)| j);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(sorted.len());
        for (j, a) in sorted {
            match merged.last_mut() {
                Some((k, acc)) if *k == j => *acc += a,
                _ => merged.push((j, a)),
            }
        }
        merged.retain(|(_, a)| *a != 0.0);
        self.constraints.push(LinearConstraint {
            terms: merged,
            relation,
            rhs,
        });
    }

    #[inline]
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    #[inline]
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    #[inline]
    pub fn constant(&self) -> f64 {
        self.constant
    }

    #[inline]
    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    /// Objective value of `values`, constant included.
    pub fn evaluate(&self, values: &[bool]) -> f64 {
        self.constant
            + self
                .objective
                .iter()
                .zip(values)
                .filter(|(_, &x)| x)
                .map(|(c, _)| c)
                .sum::<f64>()
    }

    /// True if `values` has the right length and satisfies every constraint.
    pub fn is_feasible(&self, values: &[bool]) -> bool {
        values.len() == self.num_vars && self.constraints.iter().all(|c| c.is_satisfied(values))
    }

    /// Number of nonzero constraint coefficients.
    pub fn num_nonzeros(&self) -> usize {
        self.constraints.iter().map(|c| c.terms.len()).sum()
    }
}

/// Search statistics reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// Search nodes explored
    pub nodes: u64,
    /// Constraint rows processed by propagation
    pub propagations: u64,
    /// Independent blocks solved
    pub components: usize,
}

/// Optimal solution returned by a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinarySolution {
    pub values: Vec<bool>,
    /// Objective value including the program constant.
    pub objective: f64,
    pub stats: SearchStats,
}

/// An exact 0/1 ILP backend.
///
/// `solve` must return a proven optimum, [`SolverError::Infeasible`] when no
/// feasible point exists, or another error. A backend that stops early (limits,
/// cancellation) reports an error rather than its best point so far.
pub trait BinarySolver {
    fn solve(&self, program: &BinaryProgram) -> Result<BinarySolution, SolverError>;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;
}

impl<S: BinarySolver + ?Sized> BinarySolver for &S {
    fn solve(&self, program: &BinaryProgram) -> Result<BinarySolution, SolverError> {
        (**self).solve(program)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<S: BinarySolver + ?Sized> BinarySolver for Box<S> {
    fn solve(&self, program: &BinaryProgram) -> Result<BinarySolution, SolverError> {
        (**self).solve(program)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Objective values closer than this are treated as equal.
pub(crate) const OBJECTIVE_TOLERANCE: f64 = FEASIBILITY_TOLERANCE;
