//! Error types for the tracking pipeline.
//!
//! Every failure is terminal for the run that produced it: nothing in this crate
//! substitutes a default or a partial answer. Callers that want to retry must build
//! a fresh model (e.g. with adjusted thresholds).

use std::time::Duration;

use thiserror::Error;

use crate::model::VarId;

/// Errors raised while turning hypotheses into a solved, decoded tracking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// The hypothesis store holds no frames at all.
    #[error("hypothesis store is empty")]
    EmptyStore,

    /// Frames must be numbered 0, 1, 2, ... in storage order.
    #[error("frames are not contiguous: expected frame {expected}, found frame {found}")]
    NonContiguousFrames {
        /// Frame index that should have appeared at this position
        expected: usize,
        /// Frame index that was actually stored there
        found: usize,
    },

    /// A segment claims a frame other than the one it is stored in.
    #[error("segment {segment} reports frame {reported} but is stored in frame {frame}")]
    FrameMismatch {
        /// Segment identity
        segment: u64,
        /// Frame the segment is stored in
        frame: usize,
        /// Frame the segment reports
        reported: usize,
    },

    /// Two segments in one frame share an identity.
    #[error("duplicate segment id {segment} in frame {frame}")]
    DuplicateSegment {
        /// Frame index
        frame: usize,
        /// Repeated segment identity
        segment: u64,
    },

    /// A segment's geometry cannot take part in overlap tests.
    ///
    /// Fails the whole frame: dropping the segment would silently lose exclusivity edges.
    #[error("segment {segment} in frame {frame} has unusable geometry: {reason}")]
    InvalidGeometry {
        /// Frame index
        frame: usize,
        /// Segment identity
        segment: u64,
        /// What is wrong with the region
        reason: String,
    },

    /// A cost provider returned NaN or -inf for an event that was not truncated.
    #[error("non-finite cost {cost} for {event}")]
    NonFiniteCost {
        /// Human-readable description of the event
        event: String,
        /// Offending cost value
        cost: f64,
    },

    /// Configuration rejected before any work was done.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The assembled graph is not a valid 0/1 program.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// No assignment satisfies all constraints.
    #[error("tracking problem is infeasible under the current costs and thresholds")]
    Infeasible,

    /// The solver failed or hit a limit; no assignment is available.
    #[error("solver failure: {0}")]
    Solver(SolverError),
}

impl TrackingError {
    /// True for the input-error class (raised before anything is assembled).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TrackingError::EmptyStore
                | TrackingError::NonContiguousFrames { .. }
                | TrackingError::FrameMismatch { .. }
                | TrackingError::DuplicateSegment { .. }
                | TrackingError::InvalidGeometry { .. }
        )
    }
}

impl From<SolverError> for TrackingError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::Infeasible => TrackingError::Infeasible,
            other => TrackingError::Solver(other),
        }
    }
}

/// Structural problems in a factor graph handed to the ILP adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Only 0/1 variables are supported.
    #[error("variable {var} has domain {domain}, only boolean variables are supported")]
    NonBooleanVariable {
        /// Offending variable
        var: VarId,
        /// Display form of its domain
        domain: String,
    },

    /// A factor references a variable id that does not exist.
    #[error("factor {factor} references unknown variable {var}")]
    UnknownVariable {
        /// Factor index
        factor: usize,
        /// Dangling variable id
        var: VarId,
    },

    /// A factor's coefficient list does not match its variable list.
    #[error("factor {factor} has {coefficients} coefficients for {variables} variables")]
    ArityMismatch {
        /// Factor index
        factor: usize,
        /// Number of variables in the factor
        variables: usize,
        /// Number of coefficients in the factor
        coefficients: usize,
    },

    /// A cost, coefficient or right-hand side is NaN or infinite.
    #[error("factor {factor} carries non-finite value {value}")]
    NonFiniteValue {
        /// Factor index
        factor: usize,
        /// Offending value
        value: f64,
    },

    /// An assignment was built for a graph of a different size.
    #[error("assignment has {actual} values but the graph has {expected} variables")]
    AssignmentSize {
        /// Variables in the graph
        expected: usize,
        /// Values supplied
        actual: usize,
    },
}

/// Failures of a 0/1 solver backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    /// The program has no feasible point.
    #[error("program is infeasible")]
    Infeasible,

    /// A configured limit stopped the search before optimality was proven.
    #[error("{limit} reached after {nodes} nodes ({elapsed:?})")]
    LimitReached {
        /// Which limit fired ("time limit" or "node limit")
        limit: &'static str,
        /// Nodes explored before stopping
        nodes: u64,
        /// Wall time spent
        elapsed: Duration,
    },

    /// The backend returned something that is not a valid answer.
    #[error("backend returned an invalid solution: {0}")]
    InvalidSolution(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infeasible_is_distinct_from_solver_failure() {
        let err: TrackingError = SolverError::Infeasible.into();
        assert_eq!(err, TrackingError::Infeasible);

        let err: TrackingError = SolverError::Backend("boom".to_string()).into();
        assert!(matches!(err, TrackingError::Solver(SolverError::Backend(_))));
    }

    #[test]
    fn test_error_display() {
        let err = TrackingError::NonContiguousFrames {
            expected: 2,
            found: 4,
        };
        assert!(err.to_string().contains("expected frame 2"));
        assert!(err.to_string().contains("found frame 4"));
        assert!(err.is_input_error());

        let err = TrackingError::Model(ModelError::NonBooleanVariable {
            var: VarId(7),
            domain: "integer [0, 3]".to_string(),
        });
        assert!(err.to_string().contains("v7"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_limit_display() {
        let err = SolverError::LimitReached {
            limit: "node limit",
            nodes: 100,
            elapsed: Duration::from_millis(3),
        };
        assert!(err.to_string().starts_with("node limit reached after 100 nodes"));
    }
}
