//! Low-level utilities shared across subsystems.

pub mod parallel;

pub use parallel::map_indexed;

/// Absolute tolerance for comparing constraint activities and objective values.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-9;
