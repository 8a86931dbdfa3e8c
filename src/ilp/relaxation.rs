//! Linear relaxation used as the node bound of [`BranchAndBound`](super::BranchAndBound).
//!
//! Solves
//!
//! ```text
//! minimize    sum_j c_j * x_j
//! subject to  sum_j a_ij * x_j  {<=, ==, >=}  b_i
//!             0 <= x_j <= 1
//! ```
//!
//! with a dense bounded-variable primal simplex in two phases. Nonbasic
//! variables sit at one of their bounds; inequality rows get a slack column and
//! rows the all-zero start violates get an artificial column, which phase one
//! drives to zero. Pricing is Dantzig's rule, switching to Bland's rule after a
//! run of degenerate pivots so the method terminates.
//!
//! Starting from the all-zero point and entering only columns that strictly
//! improve the objective, zero-cost choices stay at zero.

use crate::model::Relation;

/// Reduced costs above `-OPTIMALITY_TOLERANCE` are treated as non-improving.
const OPTIMALITY_TOLERANCE: f64 = 1e-9;
/// Smallest tableau entry accepted as a pivot.
const PIVOT_TOLERANCE: f64 = 1e-9;
/// Phase one objectives above this mean the relaxation is infeasible.
const INFEASIBILITY_TOLERANCE: f64 = 1e-7;
/// Steps at or below this length count as degenerate.
const STEP_TOLERANCE: f64 = 1e-12;
/// Consecutive degenerate pivots before switching to Bland's rule.
const DEGENERATE_RUN: usize = 50;

/// One row of the relaxation, over variables `0..num_vars`.
#[derive(Debug, Clone)]
pub(crate) struct RelaxedRow {
    pub terms: Vec<(usize, f64)>,
    pub relation: Relation,
    pub rhs: f64,
}

/// Result of solving a relaxation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Relaxation {
    /// No point of the box satisfies every row.
    Infeasible,
    /// Optimal value and the optimal point.
    Optimal { objective: f64, values: Vec<f64> },
    /// Iteration cap or numerical trouble; no bound is available.
    Unknown,
}

/// Solve the relaxation of `costs` under `rows`.
pub(crate) fn solve_relaxation(costs: &[f64], rows: &[RelaxedRow]) -> Relaxation {
    let mut tableau = Tableau::new(costs.len(), rows);

    if tableau.has_artificials() {
        let phase_one: Vec<f64> = (0..tableau.cols)
            .map(|j| if tableau.kind[j] == Column::Artificial { 1.0 } else { 0.0 })
            .collect();
        if !tableau.optimize(&phase_one) {
            return Relaxation::Unknown;
        }
        if tableau.objective(&phase_one) > INFEASIBILITY_TOLERANCE {
            return Relaxation::Infeasible;
        }
        tableau.retire_artificials();
    }

    let mut phase_two = vec![0.0; tableau.cols];
    phase_two[..costs.len()].copy_from_slice(costs);
    if !tableau.optimize(&phase_two) {
        return Relaxation::Unknown;
    }

    let values: Vec<f64> = tableau.x[..costs.len()]
        .iter()
        .map(|v| v.clamp(0.0, 1.0))
        .collect();
    let objective = costs.iter().zip(&values).map(|(c, v)| c * v).sum();
    Relaxation::Optimal { objective, values }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Structural,
    Slack,
    Artificial,
}

/// Tableau `B^-1 A` in row-major order plus the current point.
struct Tableau {
    rows: usize,
    cols: usize,
    a: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    x: Vec<f64>,
    kind: Vec<Column>,
    basis: Vec<usize>,
    is_basic: Vec<bool>,
}

impl Tableau {
    fn new(num_vars: usize, rows: &[RelaxedRow]) -> Self {
        let m = rows.len();
        let slacks = rows.iter().filter(|r| r.relation != Relation::Eq).count();

        // With every structural at zero, the residual of row i is rhs_i. A slack
        // can absorb it when its sign matches; otherwise the row needs an artificial.
        let needs_artificial: Vec<bool> = rows
            .iter()
            .map(|r| match r.relation {
                Relation::Le => r.rhs < 0.0,
                Relation::Ge => r.rhs > 0.0,
                Relation::Eq => true,
            })
            .collect();
        let artificials = needs_artificial.iter().filter(|&&b| b).count();

        let cols = num_vars + slacks + artificials;
        let mut kind = vec![Column::Structural; num_vars];
        kind.extend(std::iter::repeat(Column::Slack).take(slacks));
        kind.extend(std::iter::repeat(Column::Artificial).take(artificials));

        let lower = vec![0.0; cols];
        let mut upper = vec![f64::INFINITY; cols];
        upper[..num_vars].fill(1.0);
        let mut x = vec![0.0; cols];
        let mut a = vec![0.0; m * cols];
        let mut basis = vec![0; m];

        let mut next_slack = num_vars;
        let mut next_artificial = num_vars + slacks;
        for (i, row) in rows.iter().enumerate() {
            let line = &mut a[i * cols..(i + 1) * cols];
            for &(j, coef) in &row.terms {
                line[j] += coef;
            }
            let slack = match row.relation {
                Relation::Le => Some((next_slack, 1.0)),
                Relation::Ge => Some((next_slack, -1.0)),
                Relation::Eq => None,
            };
            if let Some((s, sign)) = slack {
                line[s] = sign;
                next_slack += 1;
            }

            // Scale the row so its basic column has coefficient +1.
            let (basic, scale) = if needs_artificial[i] {
                let sign = if row.rhs >= 0.0 { 1.0 } else { -1.0 };
                line[next_artificial] = sign;
                next_artificial += 1;
                (next_artificial - 1, sign)
            } else {
                // Only inequality rows reach here, and those always carry a slack.
                slack.unwrap_or((0, 1.0))
            };
            if scale != 1.0 {
                for v in line.iter_mut() {
                    *v *= scale;
                }
            }
            basis[i] = basic;
            x[basic] = row.rhs * scale;
        }

        let mut is_basic = vec![false; cols];
        for &b in &basis {
            is_basic[b] = true;
        }

        Self {
            rows: m,
            cols,
            a,
            lower,
            upper,
            x,
            kind,
            basis,
            is_basic,
        }
    }

    fn has_artificials(&self) -> bool {
        self.kind.contains(&Column::Artificial)
    }

    fn objective(&self, costs: &[f64]) -> f64 {
        costs.iter().zip(&self.x).map(|(c, v)| c * v).sum()
    }

    /// Pin every artificial to zero for phase two.
    fn retire_artificials(&mut self) {
        for j in 0..self.cols {
            if self.kind[j] == Column::Artificial {
                self.upper[j] = 0.0;
                if !self.is_basic[j] {
                    self.x[j] = 0.0;
                }
            }
        }
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> f64 {
        self.a[i * self.cols + j]
    }

    fn reduced_costs(&self, costs: &[f64]) -> Vec<f64> {
        let mut d = costs.to_vec();
        for i in 0..self.rows {
            let cb = costs[self.basis[i]];
            if cb == 0.0 {
                continue;
            }
            let line = &self.a[i * self.cols..(i + 1) * self.cols];
            for (dj, aij) in d.iter_mut().zip(line) {
                *dj -= cb * aij;
            }
        }
        d
    }

    /// Entering column and its direction (+1 increase, -1 decrease).
    fn entering(&self, d: &[f64], bland: bool) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;
        for j in 0..self.cols {
            if self.is_basic[j] || self.upper[j] <= self.lower[j] {
                continue;
            }
            let at_upper = self.x[j] >= self.upper[j];
            let (score, dir) = if !at_upper && d[j] < -OPTIMALITY_TOLERANCE {
                (-d[j], 1.0)
            } else if at_upper && d[j] > OPTIMALITY_TOLERANCE {
                (d[j], -1.0)
            } else {
                continue;
            };
            if bland {
                return Some((j, dir));
            }
            if best.map_or(true, |(_, s, _)| score > s) {
                best = Some((j, score, dir));
            }
        }
        best.map(|(j, _, dir)| (j, dir))
    }

    /// Run the simplex on `costs`; `false` if it did not reach an optimum.
    fn optimize(&mut self, costs: &[f64]) -> bool {
        let mut d = self.reduced_costs(costs);
        let max_iterations = 50 * (self.rows + self.cols) + 1000;
        let mut degenerate = 0;
        let mut bland = false;

        for _ in 0..max_iterations {
            let Some((q, dir)) = self.entering(&d, bland) else {
                return true;
            };

            // Ratio test: the entering column's own range, then every basic bound.
            let mut step = self.upper[q] - self.lower[q];
            let mut leave: Option<(usize, f64)> = None;
            for i in 0..self.rows {
                let alpha = self.at(i, q) * dir;
                let b = self.basis[i];
                let limit = if alpha > PIVOT_TOLERANCE {
                    (self.x[b] - self.lower[b]) / alpha
                } else if alpha < -PIVOT_TOLERANCE && self.upper[b].is_finite() {
                    (self.upper[b] - self.x[b]) / -alpha
                } else {
                    continue;
                };
                let limit = limit.max(0.0);
                let better = if limit < step - STEP_TOLERANCE {
                    true
                } else if limit <= step + STEP_TOLERANCE {
                    match leave {
                        None => true,
                        Some((r, _)) if bland => b < self.basis[r],
                        Some((r, _)) => alpha.abs() > self.at(r, q).abs(),
                    }
                } else {
                    false
                };
                if better {
                    step = limit;
                    leave = Some((i, alpha));
                }
            }
            if !step.is_finite() {
                return false;
            }

            if step > STEP_TOLERANCE {
                for i in 0..self.rows {
                    let b = self.basis[i];
                    self.x[b] -= self.at(i, q) * dir * step;
                }
                degenerate = 0;
            } else {
                degenerate += 1;
                if degenerate > DEGENERATE_RUN {
                    bland = true;
                }
            }

            match leave {
                None => {
                    // Bound flip.
                    self.x[q] = if dir > 0.0 { self.upper[q] } else { self.lower[q] };
                }
                Some((r, alpha)) => {
                    let b = self.basis[r];
                    self.x[q] += dir * step;
                    self.x[b] = if alpha > 0.0 { self.lower[b] } else { self.upper[b] };
                    self.pivot(r, q, &mut d);
                }
            }
        }
        log::trace!("relaxation: iteration cap reached");
        false
    }

    fn pivot(&mut self, r: usize, q: usize, d: &mut [f64]) {
        let cols = self.cols;
        let p = self.at(r, q);
        for v in &mut self.a[r * cols..(r + 1) * cols] {
            *v /= p;
        }
        let pivot_row: Vec<f64> = self.a[r * cols..(r + 1) * cols].to_vec();
        for i in 0..self.rows {
            if i == r {
                continue;
            }
            let f = self.a[i * cols + q];
            if f == 0.0 {
                continue;
            }
            for (v, pr) in self.a[i * cols..(i + 1) * cols].iter_mut().zip(&pivot_row) {
                *v -= f * pr;
            }
            self.a[i * cols + q] = 0.0;
        }
        let f = d[q];
        if f != 0.0 {
            for (dj, pr) in d.iter_mut().zip(&pivot_row) {
                *dj -= f * pr;
            }
            d[q] = 0.0;
        }

        let leaving = self.basis[r];
        self.is_basic[leaving] = false;
        self.is_basic[q] = true;
        self.basis[r] = q;
    }
}
