/*!
0/1 integer linear programming.

- [`BinaryProgram`] / [`BinarySolver`] - backend-neutral program and solve capability
- [`to_binary_program`], [`solve_factor_graph`] - the adapter between a
  [`FactorGraph`](crate::model::FactorGraph) and any backend
- [`BranchAndBound`] - built-in exact backend

Any backend that returns proven optima can be plugged in through [`BinarySolver`].
*/

pub mod adapter;
pub mod branch_bound;
pub mod program;
mod relaxation;

pub use adapter::{solve_factor_graph, solve_program, to_binary_program, SolveReport, SolverDiagnostics};
pub use branch_bound::BranchAndBound;
pub use program::{BinaryProgram, BinarySolution, BinarySolver, LinearConstraint, SearchStats};
