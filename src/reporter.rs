//! Observability for tracking runs.
//!
//! This module provides the [`TrackingReporter`] trait. Reporters receive
//! callbacks after each pipeline stage without polluting the model builder,
//! the solver adapter or the decoder.
//!
//! # Zero-Cost Abstraction
//!
//! The default [`NoOpReporter`] compiles to zero overhead: all callback
//! methods are empty and will be optimized away by the compiler.
//!
//! # Example
//!
//! ```
//! use tracking_by_assignment_rs::{DebugReporter, TrackingReporter};
//!
//! let mut reporter = DebugReporter::new();
//! // ... pass `&mut reporter` to `Tracker::track_with_reporter` ...
//! assert_eq!(reporter.total_events(), 0);
//! ```

use crate::ilp::{BinaryProgram, SolveReport};
use crate::lineage::LineageMap;
use crate::model::{FactorGraph, ModelStats};
use crate::segmentation::ConflictGraph;

// ============================================================================
// TrackingReporter Trait
// ============================================================================

/// Observability trait for tracking runs.
///
/// All methods have default empty implementations, so you only need
/// to override the events you care about.
///
/// # Thread Safety
///
/// Reporters use `&mut self` for callbacks and are only called from the
/// thread that drives the run, so they are NOT required to be `Send + Sync`.
pub trait TrackingReporter {
    /// Called once per frame after its conflict graph is built, in frame order.
    fn on_conflict_graph(&mut self, _frame: usize, _graph: &ConflictGraph) {}

    /// Called after the factor graph is assembled.
    fn on_model_built(&mut self, _graph: &FactorGraph) {}

    /// Called after the factor graph is translated, right before the solve.
    fn on_program(&mut self, _program: &BinaryProgram) {}

    /// Called after a successful solve.
    fn on_solved(&mut self, _report: &SolveReport) {}

    /// Called after the assignment is decoded.
    fn on_lineages(&mut self, _lineages: &LineageMap) {}
}

impl<R: TrackingReporter + ?Sized> TrackingReporter for &mut R {
    fn on_conflict_graph(&mut self, frame: usize, graph: &ConflictGraph) {
        (**self).on_conflict_graph(frame, graph)
    }

    fn on_model_built(&mut self, graph: &FactorGraph) {
        (**self).on_model_built(graph)
    }

    fn on_program(&mut self, program: &BinaryProgram) {
        (**self).on_program(program)
    }

    fn on_solved(&mut self, report: &SolveReport) {
        (**self).on_solved(report)
    }

    fn on_lineages(&mut self, lineages: &LineageMap) {
        (**self).on_lineages(lineages)
    }
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Zero-cost reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    pub fn new() -> Self {
        Self
    }
}

impl TrackingReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// Summary of one conflict graph as seen by [`DebugReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictSummary {
    pub frame: usize,
    pub segments: usize,
    pub conflicts: usize,
    pub cliques: usize,
}

/// Reporter that captures event summaries for debugging and tests.
///
/// Only summaries are stored, not the graphs themselves, so it is cheap to
/// leave attached for large runs.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    conflicts: Vec<ConflictSummary>,
    models: Vec<ModelStats>,
    programs: Vec<(usize, usize)>,
    solves: Vec<SolveReport>,
    lineage_counts: Vec<usize>,
}

impl DebugReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all captured events.
    pub fn clear(&mut self) {
        self.conflicts.clear();
        self.models.clear();
        self.programs.clear();
        self.solves.clear();
        self.lineage_counts.clear();
    }

    pub fn conflict_events(&self) -> &[ConflictSummary] {
        &self.conflicts
    }

    pub fn model_events(&self) -> &[ModelStats] {
        &self.models
    }

    /// `(variables, constraints)` of every program handed to a solver.
    pub fn program_events(&self) -> &[(usize, usize)] {
        &self.programs
    }

    pub fn solve_events(&self) -> &[SolveReport] {
        &self.solves
    }

    /// Number of lineages of every decode.
    pub fn lineage_events(&self) -> &[usize] {
        &self.lineage_counts
    }

    /// Total number of captured events across all types.
    pub fn total_events(&self) -> usize {
        self.conflicts.len()
            + self.models.len()
            + self.programs.len()
            + self.solves.len()
            + self.lineage_counts.len()
    }
}

impl TrackingReporter for DebugReporter {
    fn on_conflict_graph(&mut self, frame: usize, graph: &ConflictGraph) {
        self.conflicts.push(ConflictSummary {
            frame,
            segments: graph.num_segments(),
            conflicts: graph.num_conflicts(),
            cliques: graph.cliques().len(),
        });
    }

    fn on_model_built(&mut self, graph: &FactorGraph) {
        self.models.push(graph.stats());
    }

    fn on_program(&mut self, program: &BinaryProgram) {
        self.programs
            .push((program.num_vars(), program.constraints().len()));
    }

    fn on_solved(&mut self, report: &SolveReport) {
        self.solves.push(report.clone());
    }

    fn on_lineages(&mut self, lineages: &LineageMap) {
        self.lineage_counts.push(lineages.len());
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that logs events using the log crate.
///
/// # Log Levels
///
/// - `on_model_built`, `on_solved`, `on_lineages`: INFO
/// - `on_conflict_graph`, `on_program`: DEBUG
/// - per-lineage detail (verbose only): TRACE
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    /// Whether to log every lineage
    verbose: bool,
}

impl LoggingReporter {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Create a verbose logging reporter that includes lineage details.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl TrackingReporter for LoggingReporter {
    fn on_conflict_graph(&mut self, frame: usize, graph: &ConflictGraph) {
        log::debug!(
            "Frame {}: {} hypotheses, {} conflicting pairs, {} cliques",
            frame,
            graph.num_segments(),
            graph.num_conflicts(),
            graph.cliques().len()
        );
    }

    fn on_model_built(&mut self, graph: &FactorGraph) {
        let stats = graph.stats();
        log::info!(
            "Model built: {} frames, {} variables, {} conflict and {} flow constraints",
            stats.frames,
            stats.variables.total(),
            stats.conflict_constraints,
            stats.flow_constraints
        );
    }

    fn on_program(&mut self, program: &BinaryProgram) {
        log::debug!(
            "Program: {} variables, {} constraints, {} nonzeros",
            program.num_vars(),
            program.constraints().len(),
            program.num_nonzeros()
        );
    }

    fn on_solved(&mut self, report: &SolveReport) {
        let d = &report.diagnostics;
        log::info!(
            "Solved with {}: objective {:.4}, {} nodes, {} blocks, {:?}",
            report.solver,
            d.objective,
            d.nodes,
            d.components,
            d.wall_time
        );
        let c = &report.counts;
        log::info!(
            "Selected: {} segments, {} moves, {} divisions, {} appearances, {} disappearances",
            c.segments,
            c.movements,
            c.divisions,
            c.appearances,
            c.disappearances
        );
    }

    fn on_lineages(&mut self, lineages: &LineageMap) {
        log::info!("Decoded {} lineages", lineages.len());
        if self.verbose {
            for l in lineages.lineages() {
                log::trace!(
                    "  {}: root {}, {} segments, frames {}..={}, {} divisions",
                    l.id,
                    l.root,
                    l.len(),
                    l.first_frame(),
                    l.last_frame(),
                    l.num_divisions()
                );
            }
        }
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards events to two child reporters.
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: TrackingReporter, B: TrackingReporter> {
    first: A,
    second: B,
}

impl<A: TrackingReporter, B: TrackingReporter> CompositeReporter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    /// Consume and return both reporters.
    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: TrackingReporter, B: TrackingReporter> TrackingReporter for CompositeReporter<A, B> {
    fn on_conflict_graph(&mut self, frame: usize, graph: &ConflictGraph) {
        self.first.on_conflict_graph(frame, graph);
        self.second.on_conflict_graph(frame, graph);
    }

    fn on_model_built(&mut self, graph: &FactorGraph) {
        self.first.on_model_built(graph);
        self.second.on_model_built(graph);
    }

    fn on_program(&mut self, program: &BinaryProgram) {
        self.first.on_program(program);
        self.second.on_program(program);
    }

    fn on_solved(&mut self, report: &SolveReport) {
        self.first.on_solved(report);
        self.second.on_solved(report);
    }

    fn on_lineages(&mut self, lineages: &LineageMap) {
        self.first.on_lineages(lineages);
        self.second.on_lineages(lineages);
    }
}

// ============================================================================
// Tests
// ============================================================================
