//! Scenario runner for the tracking engine.
//!
//! Usage:
//!     track_scenario --scenario <path> [--pretty] [--node-limit N] [--time-limit-ms MS]
//!
//! Output:
//!     Prints the decoded lineages, event counts, solver diagnostics and stage
//!     timings as one JSON document. Exit 0 on success, non-zero on error.
//!
//! Scenario format:
//!
//! ```json
//! {
//!   "config": { "thresholds": { "movement": 50.0 } },
//!   "costs": { "geometric": { "displacement_weight": 0.2 } },
//!   "frames": [
//!     [ { "id": 1, "pixels": [[0, 0], [0, 1]] } ],
//!     [ { "id": 2, "rect": [1, 0, 2, 2] } ]
//!   ]
//! }
//! ```
//!
//! `config` and `costs` are optional (defaults: [`TrackingConfig::default`] and
//! geometric costs). `costs` may also be `{ "table": { ... } }`.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use serde::{Deserialize, Serialize};

use tracking_by_assignment_rs::{
    CostModel, EventCounts, GeometricCosts, HypothesisStore, LineageMap, LoggingReporter,
    ModelStats, Region, Segment, SolverDiagnostics, TableCosts, TimingBreakdown, Tracker,
    TrackingConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "track_scenario")]
#[command(about = "Run the tracking-by-assignment pipeline on a JSON scenario")]
struct Args {
    /// Path to scenario JSON file
    #[arg(long)]
    scenario: String,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    /// Override the solver node limit
    #[arg(long)]
    node_limit: Option<u64>,

    /// Override the solver time limit (milliseconds)
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Build the model on the calling thread only
    #[arg(long)]
    sequential: bool,
}

// =============================================================================
// JSON Schema
// =============================================================================

#[derive(Deserialize)]
struct ScenarioJson {
    #[serde(default)]
    config: TrackingConfig,
    #[serde(default)]
    costs: CostsJson,
    frames: Vec<Vec<SegmentJson>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum CostsJson {
    Table(TableCosts),
    Geometric(GeometricCosts),
}

impl Default for CostsJson {
    fn default() -> Self {
        CostsJson::Geometric(GeometricCosts::default())
    }
}

#[derive(Deserialize)]
struct SegmentJson {
    id: u64,
    #[serde(default)]
    pixels: Option<Region>,
    /// `[x, y, width, height]`
    #[serde(default)]
    rect: Option<[i64; 4]>,
}

#[derive(Serialize)]
struct OutputJson<'a> {
    costs: &'static str,
    model: ModelStats,
    diagnostics: &'a SolverDiagnostics,
    counts: &'a EventCounts,
    timings: &'a TimingBreakdown,
    lineages: &'a LineageMap,
}

// =============================================================================
// Main
// =============================================================================

fn build_store(frames: Vec<Vec<SegmentJson>>) -> Result<HypothesisStore, String> {
    let frames = frames
        .into_iter()
        .enumerate()
        .map(|(frame, segments)| {
            segments
                .into_iter()
                .map(|s| {
                    let region = match (s.pixels, s.rect) {
                        (Some(pixels), _) => pixels,
                        (None, Some([x, y, w, h])) => Region::rectangle(x, y, w, h),
                        (None, None) => {
                            return Err(format!("segment {} has neither pixels nor rect", s.id))
                        }
                    };
                    Ok(Segment::new(s.id, frame, region))
                })
                .collect::<Result<Vec<_>, String>>()
        })
        .collect::<Result<Vec<_>, String>>()?;
    HypothesisStore::from_segments(frames).map_err(|e| e.to_string())
}

fn run_with<C: CostModel>(
    config: TrackingConfig,
    costs: C,
    store: &HypothesisStore,
    pretty: bool,
) -> Result<String, String> {
    let tracker = Tracker::new(config, costs).map_err(|e| e.to_string())?;
    let result = tracker
        .track_with_reporter(store, &mut LoggingReporter::new())
        .map_err(|e| e.to_string())?;

    let output = OutputJson {
        costs: tracker.costs().name(),
        model: result.graph.stats(),
        diagnostics: &result.report.diagnostics,
        counts: &result.report.counts,
        timings: &result.timings,
        lineages: &result.lineages,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    };
    json.map_err(|e| e.to_string())
}

fn run(args: Args) -> Result<String, String> {
    let text = fs::read_to_string(&args.scenario)
        .map_err(|e| format!("cannot read {}: {}", args.scenario, e))?;
    let scenario: ScenarioJson =
        serde_json::from_str(&text).map_err(|e| format!("invalid scenario: {}", e))?;

    let mut config = scenario.config;
    if let Some(nodes) = args.node_limit {
        config.solver.node_limit = Some(nodes);
    }
    if let Some(ms) = args.time_limit_ms {
        config.solver.time_limit_ms = Some(ms);
    }
    if args.sequential {
        config.parallel = false;
    }
    log::debug!("Config: {}", config.to_json());

    let store = build_store(scenario.frames)?;
    match scenario.costs {
        CostsJson::Table(costs) => run_with(config, costs, &store, args.pretty),
        CostsJson::Geometric(costs) => run_with(config, costs, &store, args.pretty),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
