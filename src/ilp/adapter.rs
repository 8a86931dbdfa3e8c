//! Translation of a [`FactorGraph`] into a [`BinaryProgram`] and back.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::program::{BinaryProgram, BinarySolver};
use crate::errors::{ModelError, SolverError, TrackingError};
use crate::model::{Assignment, EventCounts, Factor, FactorGraph, Relation};

/// Solver diagnostics of one solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolverDiagnostics {
    /// Objective value of the returned assignment, false-state costs included.
    pub objective: f64,
    pub nodes: u64,
    pub propagations: u64,
    pub components: usize,
    pub wall_time: Duration,
}

/// Outcome of a successful solve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    pub solver: String,
    pub num_variables: usize,
    pub num_constraints: usize,
    pub diagnostics: SolverDiagnostics,
    /// True indicators per event kind.
    pub counts: EventCounts,
}

/// Convert a factor graph into a 0/1 program with one column per variable.
///
/// Rejects non-boolean variables, dangling variable references, weighted sums whose
/// coefficient list does not match their variable list, and non-finite values.
/// Unary costs contribute `cost_true - cost_false` to the column and `cost_false`
/// to the constant.
pub fn to_binary_program(graph: &FactorGraph) -> Result<BinaryProgram, ModelError> {
    let n = graph.num_variables();
    if let Some(var) = graph.variables().iter().find(|v| !v.is_boolean()) {
        return Err(ModelError::NonBooleanVariable {
            var: var.id,
            domain: var.domain.to_string(),
        });
    }

    let mut program = BinaryProgram::new(n);
    for (index, factor) in graph.factors().iter().enumerate() {
        if let Some(&var) = factor.variables().iter().find(|v| v.0 >= n) {
            return Err(ModelError::UnknownVariable { factor: index, var });
        }
        let finite = |value: f64| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(ModelError::NonFiniteValue {
                    factor: index,
                    value,
                })
            }
        };

        match factor {
            Factor::UnaryCost {
                var,
                cost_true,
                cost_false,
            } => {
                let (t, f) = (finite(*cost_true)?, finite(*cost_false)?);
                program.add_cost(var.0, t - f);
                program.add_constant(f);
            }
            Factor::ConflictConstraint { vars } => {
                program.add_constraint(vars.iter().map(|v| (v.0, 1.0)), Relation::Le, 1.0);
            }
            Factor::WeightedSumConstraint {
                vars,
                coefficients,
                relation,
                rhs,
            } => {
                if vars.len() != coefficients.len() {
                    return Err(ModelError::ArityMismatch {
                        factor: index,
                        variables: vars.len(),
                        coefficients: coefficients.len(),
                    });
                }
                for &a in coefficients {
                    finite(a)?;
                }
                let rhs = finite(*rhs)?;
                program.add_constraint(
                    vars.iter().zip(coefficients).map(|(v, &a)| (v.0, a)),
                    *relation,
                    rhs,
                );
            }
        }
    }
    Ok(program)
}

/// Solve `graph` with `solver`.
///
/// The returned assignment is checked against every constraint factor of the graph;
/// a backend answer that violates one is reported as
/// [`SolverError::InvalidSolution`], never exposed.
pub fn solve_factor_graph<S: BinarySolver + ?Sized>(
    graph: &FactorGraph,
    solver: &S,
) -> Result<(Assignment, SolveReport), TrackingError> {
    let program = to_binary_program(graph)?;
    solve_program(graph, &program, solver)
}

/// Solve an already translated program of `graph`.
pub fn solve_program<S: BinarySolver + ?Sized>(
    graph: &FactorGraph,
    program: &BinaryProgram,
    solver: &S,
) -> Result<(Assignment, SolveReport), TrackingError> {
    if program.num_vars() != graph.num_variables() {
        return Err(ModelError::AssignmentSize {
            expected: graph.num_variables(),
            actual: program.num_vars(),
        }
        .into());
    }

    let start = Instant::now();
    let solution = solver.solve(program)?;
    let wall_time = start.elapsed();

    if solution.values.len() != graph.num_variables() {
        return Err(SolverError::InvalidSolution(format!(
            "{} values for {} variables",
            solution.values.len(),
            graph.num_variables()
        ))
        .into());
    }
    let assignment = Assignment::new(graph, solution.values)?;
    if let Err(violation) = graph.check_assignment(&assignment) {
        return Err(SolverError::InvalidSolution(violation.to_string()).into());
    }

    let objective = graph.objective(&assignment);
    log::debug!(
        "{}: objective {:.6} (backend reported {:.6}) in {:?}",
        solver.name(),
        objective,
        solution.objective,
        wall_time
    );

    let report = SolveReport {
        solver: solver.name().to_string(),
        num_variables: program.num_vars(),
        num_constraints: program.constraints().len(),
        diagnostics: SolverDiagnostics {
            objective,
            nodes: solution.stats.nodes,
            propagations: solution.stats.propagations,
            components: solution.stats.components,
            wall_time,
        },
        counts: graph.count_true(&assignment),
    };
    Ok((assignment, report))
}
