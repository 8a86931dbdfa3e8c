/*!
# Tracking by assignment

Multi-hypothesis cell tracking as an exact 0/1 integer linear program.

Every frame comes with a set of overlapping candidate regions ("hypotheses").
The engine selects a conflict-free subset per frame and links the selected
regions across frames into branching lineages (appearance, movement, division,
disappearance), minimizing the total cost of the selected events.

## Pipeline

1. [`segmentation`] - hypothesis store and per-frame conflict cliques
2. [`costs`] - pluggable cost providers for the five event kinds
3. [`model`] - boolean factor graph: indicators, costs, conflict and flow constraints
4. [`ilp`] - translation to a generic 0/1 program and the built-in exact backend
5. [`lineage`] - decoding of the optimal assignment into lineage trees

[`Tracker`] runs all stages; [`reporter`] and [`timing`] observe them.

## Example

```rust
use tracking_by_assignment_rs::{
    HypothesisStore, Region, Segment, SegmentKey, TableCosts, Tracker, TrackingConfig,
};

// Frame 0: A. Frame 1: C and D, far apart.
let store = HypothesisStore::from_segments(vec![
    vec![Segment::new(1, 0, Region::rectangle(0, 0, 4, 4))],
    vec![
        Segment::new(2, 1, Region::rectangle(1, 0, 4, 4)),
        Segment::new(3, 1, Region::rectangle(40, 0, 4, 4)),
    ],
])
.unwrap();

let costs = TableCosts::new()
    .with_segment(1, -11.0)
    .with_movement(1, 2, 1.0)
    .with_movement(1, 3, 5.0)
    .with_disappearance(1, 10.0);

let tracker = Tracker::new(TrackingConfig::default(), costs).unwrap();
let result = tracker.track(&store).unwrap();

assert_eq!(result.objective(), -10.0);
assert_eq!(result.active_segments(1), &[SegmentKey::new(1, 0)]);
assert_eq!(result.lineages.len(), 1);
```
*/

// ============================================================================
// Core modules
// ============================================================================

/// Hypothesis store and conflict graph builder
pub mod segmentation;

/// Cost providers
pub mod costs;

/// Factor graph and its assembler
pub mod model;

/// 0/1 programs, the solver adapter and the built-in backend
pub mod ilp;

/// Solution decoder and lineage reconstruction
pub mod lineage;

/// End-to-end pipeline
pub mod tracker;

// ============================================================================
// Ambient modules
// ============================================================================

pub mod config;
pub mod errors;
pub mod reporter;
pub mod timing;

/// Low-level utilities (parallel fan-out, tolerances)
pub mod common;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// Input
pub use segmentation::{
    build_conflict_graph, build_conflict_graphs, ConflictClique, ConflictGraph, Frame,
    HypothesisStore, Region, Segment, SegmentId, SegmentKey,
};

// Costs
pub use costs::{CostModel, DefaultCosts, EventKind, GeometricCosts, TableCosts};

// Model
pub use model::{
    Assignment, EventCounts, Factor, FactorGraph, Indicator, IndicatorVar, ModelStats, Relation,
    TrackingModelBuilder, VarId, VariableDomain,
};

// Solving
pub use ilp::{
    solve_factor_graph, to_binary_program, BinaryProgram, BinarySolution, BinarySolver,
    BranchAndBound, SolveReport, SolverDiagnostics,
};

// Output
pub use lineage::{decode_lineages, Lineage, LineageId, LineageMap};

// Pipeline
pub use tracker::{Tracker, TrackingResult};

// Configuration and errors
pub use config::{SolverConfig, TrackingConfig, TruncationThresholds};
pub use errors::{ModelError, SolverError, TrackingError};

// Observability
pub use reporter::{CompositeReporter, DebugReporter, LoggingReporter, NoOpReporter, TrackingReporter};
pub use timing::{StageTiming, TimingBreakdown};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
