//! End-to-end pipeline: conflicts, model, solve, decode.

use crate::config::TrackingConfig;
use crate::costs::CostModel;
use crate::errors::TrackingError;
use crate::ilp::{solve_program, to_binary_program, BinarySolver, BranchAndBound, SolveReport};
use crate::lineage::{decode_lineages, LineageMap};
use crate::model::{Assignment, FactorGraph, TrackingModelBuilder};
use crate::reporter::{NoOpReporter, TrackingReporter};
use crate::segmentation::{build_conflict_graphs, ConflictGraph, HypothesisStore, SegmentKey};
use crate::timing::TimingBreakdown;

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct TrackingResult {
    pub conflicts: Vec<ConflictGraph>,
    pub graph: FactorGraph,
    pub assignment: Assignment,
    pub report: SolveReport,
    pub lineages: LineageMap,
    pub timings: TimingBreakdown,
}

impl TrackingResult {
    /// Optimal objective value.
    pub fn objective(&self) -> f64 {
        self.report.diagnostics.objective
    }

    /// Active segments of `frame`.
    pub fn active_segments(&self, frame: usize) -> &[SegmentKey] {
        self.lineages.active_segments(frame)
    }

    /// Solve the already built model again with another backend and decode the answer.
    ///
    /// The model is not rebuilt; this run's result is left untouched.
    pub fn resolve<S: BinarySolver + ?Sized>(
        &self,
        solver: &S,
    ) -> Result<(Assignment, SolveReport, LineageMap), TrackingError> {
        let program = to_binary_program(&self.graph)?;
        let (assignment, report) = solve_program(&self.graph, &program, solver)?;
        let lineages = decode_lineages(&self.graph, &assignment);
        Ok((assignment, report, lineages))
    }
}

/// Tracking-by-assignment engine.
///
/// ```
/// use tracking_by_assignment_rs::{
///     HypothesisStore, Region, Segment, TableCosts, Tracker, TrackingConfig,
/// };
///
/// // One frame, two overlapping hypotheses: only the cheaper one survives.
/// let store = HypothesisStore::from_segments(vec![vec![
///     Segment::new(1, 0, Region::rectangle(0, 0, 4, 4)),
///     Segment::new(2, 0, Region::rectangle(1, 1, 4, 4)),
/// ]])
/// .unwrap();
/// let costs = TableCosts::new().with_segment(1, -1.0).with_segment(2, -2.0);
/// let tracker = Tracker::new(TrackingConfig::default(), costs).unwrap();
/// let result = tracker.track(&store).unwrap();
/// assert_eq!(result.objective(), -2.0);
/// assert_eq!(result.active_segments(0).len(), 1);
/// ```
pub struct Tracker<C: CostModel, S: BinarySolver = BranchAndBound> {
    config: TrackingConfig,
    costs: C,
    solver: S,
}

impl<C: CostModel> Tracker<C> {
    /// Tracker with the built-in branch-and-bound backend.
    pub fn new(config: TrackingConfig, costs: C) -> Result<Self, TrackingError> {
        let solver = BranchAndBound::new(config.solver);
        Self::with_solver(config, costs, solver)
    }
}

impl<C: CostModel, S: BinarySolver> Tracker<C, S> {
    pub fn with_solver(config: TrackingConfig, costs: C, solver: S) -> Result<Self, TrackingError> {
        config.validate()?;
        Ok(Self {
            config,
            costs,
            solver,
        })
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn costs(&self) -> &C {
        &self.costs
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Run the full pipeline on `store`.
    pub fn track(&self, store: &HypothesisStore) -> Result<TrackingResult, TrackingError> {
        self.track_with_reporter(store, &mut NoOpReporter)
    }

    /// Run the full pipeline, reporting every stage to `reporter`.
    ///
    /// Any failure aborts the run; nothing partial is returned.
    pub fn track_with_reporter<R: TrackingReporter + ?Sized>(
        &self,
        store: &HypothesisStore,
        reporter: &mut R,
    ) -> Result<TrackingResult, TrackingError> {
        log::info!(
            "Tracking {} frames, {} hypotheses, {} costs, {} solver",
            store.num_frames(),
            store.num_segments(),
            self.costs.name(),
            self.solver.name()
        );
        let mut timings = TimingBreakdown::default();

        let conflicts = timings.time("conflict_graphs", || {
            build_conflict_graphs(store, self.config.parallel)
        })?;
        for graph in &conflicts {
            reporter.on_conflict_graph(graph.frame(), graph);
        }

        let builder = TrackingModelBuilder::new(&self.config, &self.costs);
        let graph = timings.time("model", || builder.build(store, &conflicts))?;
        reporter.on_model_built(&graph);

        let program = timings.time("program", || to_binary_program(&graph))?;
        reporter.on_program(&program);

        let (assignment, report) =
            timings.time("solve", || solve_program(&graph, &program, &self.solver))?;
        reporter.on_solved(&report);

        let lineages = timings.time("decode", || decode_lineages(&graph, &assignment));
        reporter.on_lineages(&lineages);

        timings.finish();
        log::debug!("Tracking finished in {:.3} ms", timings.total_ms);

        Ok(TrackingResult {
            conflicts,
            graph,
            assignment,
            report,
            lineages,
            timings,
        })
    }
}
