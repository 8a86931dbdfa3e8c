//! Factor graph assembly.
//!
//! Assembly runs in three phases:
//!
//! 1. per frame: price segment selection, appearance and disappearance
//! 2. per frame pair: price every movement and division candidate
//! 3. a single writer turns the priced candidates into variables and factors
//!
//! Phases 1 and 2 only read the store and may run on the rayon pool. Phase 3 walks
//! their results in frame order, so variable and factor numbering does not depend
//! on whether the first two phases ran in parallel.

use super::factors::{Factor, Relation};
use super::graph::{FactorGraph, SegmentNode};
use super::variables::{Indicator, VarId};
use crate::common::map_indexed;
use crate::config::TrackingConfig;
use crate::costs::{CostModel, EventKind};
use crate::errors::TrackingError;
use crate::segmentation::{build_conflict_graphs, ConflictGraph, HypothesisStore, SegmentKey};

/// Priced unary events of one segment. `None` means truncated or not applicable.
#[derive(Debug, Clone, Copy)]
struct UnaryCosts {
    segment: f64,
    appearance: Option<f64>,
    disappearance: Option<f64>,
}

/// Admitted transition candidates between frame `f` and `f + 1`.
#[derive(Debug, Default)]
struct Transitions {
    movements: Vec<(usize, usize, f64)>,
    divisions: Vec<(usize, [usize; 2], f64)>,
    truncated: usize,
}

/// Builds the [`FactorGraph`] of a hypothesis store.
pub struct TrackingModelBuilder<'a, C: CostModel + ?Sized> {
    config: &'a TrackingConfig,
    costs: &'a C,
}

impl<'a, C: CostModel + ?Sized> TrackingModelBuilder<'a, C> {
    pub fn new(config: &'a TrackingConfig, costs: &'a C) -> Self {
        Self { config, costs }
    }

    /// Build conflict graphs for the store, then the model.
    pub fn build_from_store(
        &self,
        store: &HypothesisStore,
    ) -> Result<(Vec<ConflictGraph>, FactorGraph), TrackingError> {
        let conflicts = build_conflict_graphs(store, self.config.parallel)?;
        let graph = self.build(store, &conflicts)?;
        Ok((conflicts, graph))
    }

    /// Build the model from a store and its per-frame conflict graphs.
    ///
    /// `conflicts[f]` must be the graph of frame `f`.
    pub fn build(
        &self,
        store: &HypothesisStore,
        conflicts: &[ConflictGraph],
    ) -> Result<FactorGraph, TrackingError> {
        let num_frames = store.num_frames();
        if conflicts.len() != num_frames {
            return Err(TrackingError::Configuration(format!(
                "{} conflict graphs supplied for {} frames",
                conflicts.len(),
                num_frames
            )));
        }
        for (expected, graph) in conflicts.iter().enumerate() {
            if graph.frame() != expected {
                return Err(TrackingError::NonContiguousFrames {
                    expected,
                    found: graph.frame(),
                });
            }
            if graph.num_segments() != store.segments(expected).len() {
                return Err(TrackingError::Configuration(format!(
                    "conflict graph of frame {} covers {} segments, frame has {}",
                    expected,
                    graph.num_segments(),
                    store.segments(expected).len()
                )));
            }
        }

        let parallel = self.config.parallel;
        let unary = map_indexed(num_frames, parallel, |f| self.price_frame(store, f))?;
        let transitions = map_indexed(num_frames.saturating_sub(1), parallel, |f| {
            self.price_transitions(store, &conflicts[f + 1], f)
        })?;

        let mut graph = FactorGraph::new(num_frames);
        self.add_segments(&mut graph, store, &unary);
        for (f, t) in transitions.iter().enumerate() {
            add_transitions(&mut graph, f, t);
        }
        add_conflict_constraints(&mut graph, conflicts);
        add_flow_constraints(&mut graph, num_frames);

        let stats = graph.stats();
        let truncated: usize = transitions.iter().map(|t| t.truncated).sum();
        log::debug!(
            "model: {} variables ({} segments, {} movements, {} divisions, {} appearances, {} disappearances), {} candidates truncated",
            graph.num_variables(),
            stats.variables.segments,
            stats.variables.movements,
            stats.variables.divisions,
            stats.variables.appearances,
            stats.variables.disappearances,
            truncated
        );
        Ok(graph)
    }

    fn price_frame(
        &self,
        store: &HypothesisStore,
        frame: usize,
    ) -> Result<Vec<UnaryCosts>, TrackingError> {
        let last = store.num_frames() - 1;
        store
            .segments(frame)
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let key = SegmentKey::new(frame, index);
                let segment_cost = self.admit(
                    EventKind::Segment,
                    self.costs.segment_cost(frame, segment),
                    || format!("segment {}", key),
                )?;
                // Segment selection is never truncated, so `admit` always yields a cost.
                let segment_cost = segment_cost.ok_or_else(|| TrackingError::NonFiniteCost {
                    event: format!("segment {}", key),
                    cost: f64::INFINITY,
                })?;
                let appearance = if frame > 0 {
                    self.admit(
                        EventKind::Appearance,
                        self.costs.appearance_cost(frame, segment),
                        || format!("appearance {}", key),
                    )?
                } else {
                    None
                };
                let disappearance = if frame < last {
                    self.admit(
                        EventKind::Disappearance,
                        self.costs.disappearance_cost(frame, segment),
                        || format!("disappearance {}", key),
                    )?
                } else {
                    None
                };
                Ok(UnaryCosts {
                    segment: segment_cost,
                    appearance,
                    disappearance,
                })
            })
            .collect()
    }

    fn price_transitions(
        &self,
        store: &HypothesisStore,
        next_conflicts: &ConflictGraph,
        frame: usize,
    ) -> Result<Transitions, TrackingError> {
        let sources = store.segments(frame);
        let targets = store.segments(frame + 1);
        let mut out = Transitions::default();

        for (i, from) in sources.iter().enumerate() {
            for (j, to) in targets.iter().enumerate() {
                let cost = self.admit(
                    EventKind::Movement,
                    self.costs.movement_cost(frame, from, to),
                    || {
                        format!(
                            "movement {} -> {}",
                            SegmentKey::new(frame, i),
                            SegmentKey::new(frame + 1, j)
                        )
                    },
                )?;
                match cost {
                    Some(c) => out.movements.push((i, j, c)),
                    None => out.truncated += 1,
                }
            }

            for a in 0..targets.len() {
                for b in (a + 1)..targets.len() {
                    if self.config.skip_conflicting_divisions && next_conflicts.conflicts(a, b) {
                        continue;
                    }
                    let cost = self.admit(
                        EventKind::Division,
                        self.costs.division_cost(frame, from, (&targets[a], &targets[b])),
                        || {
                            format!(
                                "division {} -> ({}, {})",
                                SegmentKey::new(frame, i),
                                SegmentKey::new(frame + 1, a),
                                SegmentKey::new(frame + 1, b)
                            )
                        },
                    )?;
                    match cost {
                        Some(c) => out.divisions.push((i, [a, b], c)),
                        None => out.truncated += 1,
                    }
                }
            }
        }

        log::trace!(
            "frames {}->{}: {} movements, {} divisions admitted, {} truncated",
            frame,
            frame + 1,
            out.movements.len(),
            out.divisions.len(),
            out.truncated
        );
        Ok(out)
    }

    /// Apply truncation to one priced event.
    ///
    /// `Ok(None)` when the cost reaches the threshold of its kind. NaN and `-inf` are
    /// always errors, as is `+inf` for kinds that are never truncated.
    fn admit(
        &self,
        kind: EventKind,
        cost: f64,
        describe: impl FnOnce() -> String,
    ) -> Result<Option<f64>, TrackingError> {
        if cost.is_nan() || cost == f64::NEG_INFINITY {
            return Err(TrackingError::NonFiniteCost {
                event: describe(),
                cost,
            });
        }
        match self.config.thresholds.for_kind(kind) {
            Some(threshold) if cost >= threshold => Ok(None),
            _ if cost.is_infinite() => Err(TrackingError::NonFiniteCost {
                event: describe(),
                cost,
            }),
            _ => Ok(Some(cost)),
        }
    }

    fn add_segments(&self, graph: &mut FactorGraph, store: &HypothesisStore, unary: &[Vec<UnaryCosts>]) {
        for (frame, costs) in unary.iter().enumerate() {
            for (index, (segment, c)) in store.segments(frame).iter().zip(costs).enumerate() {
                let key = SegmentKey::new(frame, index);
                let active = graph.add_variable(Indicator::Segment { segment: key });
                graph.add_factor(Factor::cost(active, c.segment));
                let mut node = SegmentNode::new(key, segment.id, active);

                if let Some(cost) = c.appearance {
                    let var = graph.add_variable(Indicator::Appearance { segment: key });
                    graph.add_factor(Factor::cost(var, cost));
                    node.appearance = Some(var);
                }
                if let Some(cost) = c.disappearance {
                    let var = graph.add_variable(Indicator::Disappearance { segment: key });
                    graph.add_factor(Factor::cost(var, cost));
                    node.disappearance = Some(var);
                }
                graph.push_node(node);
            }
        }
    }
}

fn add_transitions(graph: &mut FactorGraph, frame: usize, t: &Transitions) {
    for &(i, j, cost) in &t.movements {
        let from = SegmentKey::new(frame, i);
        let to = SegmentKey::new(frame + 1, j);
        let var = graph.add_variable(Indicator::Movement { from, to });
        graph.add_factor(Factor::cost(var, cost));
        link(graph, from, |n| n.moves_out.push(var));
        link(graph, to, |n| n.moves_in.push(var));
    }
    for &(i, [a, b], cost) in &t.divisions {
        let from = SegmentKey::new(frame, i);
        let to = [SegmentKey::new(frame + 1, a), SegmentKey::new(frame + 1, b)];
        let var = graph.add_variable(Indicator::Division { from, to });
        graph.add_factor(Factor::cost(var, cost));
        link(graph, from, |n| n.divisions_out.push(var));
        for key in to {
            link(graph, key, |n| n.divisions_in.push(var));
        }
    }
}

fn link(graph: &mut FactorGraph, key: SegmentKey, f: impl FnOnce(&mut SegmentNode)) {
    if let Some(node) = graph.node_mut(key) {
        f(node);
    }
}

/// One `sum <= 1` constraint per maximal clique.
fn add_conflict_constraints(graph: &mut FactorGraph, conflicts: &[ConflictGraph]) {
    for conflict in conflicts {
        let frame = conflict.frame();
        for clique in conflict.cliques() {
            let vars: Vec<VarId> = clique
                .members()
                .iter()
                .filter_map(|&index| graph.node(SegmentKey::new(frame, index)))
                .map(|n| n.active)
                .collect();
            graph.add_factor(Factor::ConflictConstraint { vars });
        }
    }
}

/// Per segment and side: `active - sum(transitions) - slack = 0`.
///
/// The out side exists for every frame but the last (slack: disappearance), the in
/// side for every frame but the first (slack: appearance). A missing slack variable
/// (truncated) simply drops out of the sum.
fn add_flow_constraints(graph: &mut FactorGraph, num_frames: usize) {
    let mut rows: Vec<Vec<VarId>> = Vec::new();
    for frame in 0..num_frames {
        for node in graph.segment_nodes(frame) {
            if frame + 1 < num_frames {
                let mut vars = vec![node.active];
                vars.extend(node.outgoing());
                vars.extend(node.disappearance);
                rows.push(vars);
            }
            if frame > 0 {
                let mut vars = vec![node.active];
                vars.extend(node.incoming());
                vars.extend(node.appearance);
                rows.push(vars);
            }
        }
    }
    for vars in rows {
        let mut coefficients = vec![-1.0; vars.len()];
        coefficients[0] = 1.0;
        graph.add_factor(Factor::WeightedSumConstraint {
            vars,
            coefficients,
            relation: Relation::Eq,
            rhs: 0.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::TableCosts;
    use crate::model::Assignment;
    use crate::segmentation::{Region, Segment};

    fn seg(id: u64, frame: usize, x: i64) -> Segment {
        Segment::new(id, frame, Region::rectangle(x, 0, 2, 2))
    }

    fn config() -> TrackingConfig {
        TrackingConfig::builder().parallel(false).build()
    }

    #[test]
    fn test_single_frame_has_no_flow_constraints() {
        let store = HypothesisStore::from_segments(vec![vec![seg(1, 0, 0), seg(2, 0, 1)]]).unwrap();
        let costs = TableCosts::new().with_segment(1, -1.0).with_segment(2, -2.0);
        let cfg = config();
        let (_, graph) = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap();
        let stats = graph.stats();
        assert_eq!(stats.variables.total(), 2);
        assert_eq!(stats.conflict_constraints, 1);
        assert_eq!(stats.flow_constraints, 0);
        assert!(graph.segment_nodes(0).iter().all(|n| n.appearance.is_none()));
    }

    #[test]
    fn test_truncated_candidates_are_omitted() {
        let store = HypothesisStore::from_segments(vec![
            vec![seg(1, 0, 0)],
            vec![seg(2, 1, 0), seg(3, 1, 10)],
        ])
        .unwrap();
        let costs = TableCosts::new()
            .with_movement(1, 2, 1.0)
            .with_movement(1, 3, 5_000.0)
            .with_division(1, (2, 3), 2.0);
        let cfg = config();
        let (_, graph) = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap();
        let stats = graph.stats();
        assert_eq!(stats.variables.movements, 1);
        assert_eq!(stats.variables.divisions, 1);
        assert_eq!(stats.variables.appearances, 2);
        assert_eq!(stats.variables.disappearances, 1);
        // Out side of segment 1, in side of segments 2 and 3.
        assert_eq!(stats.flow_constraints, 3);

        let node = graph.node(SegmentKey::new(0, 0)).unwrap();
        assert_eq!(node.moves_out.len(), 1);
        assert_eq!(node.divisions_out.len(), 1);
        for index in 0..2 {
            let node = graph.node(SegmentKey::new(1, index)).unwrap();
            assert_eq!(node.divisions_in, graph.node(SegmentKey::new(0, 0)).unwrap().divisions_out);
        }
    }

    #[test]
    fn test_conflicting_division_skipped() {
        let store = HypothesisStore::from_segments(vec![
            vec![seg(1, 0, 0)],
            vec![seg(2, 1, 0), seg(3, 1, 1)],
        ])
        .unwrap();
        let costs = TableCosts::new().with_division(1, (2, 3), 2.0);
        let cfg = config();
        let (_, graph) = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap();
        assert_eq!(graph.stats().variables.divisions, 0);

        let cfg = TrackingConfig::builder()
            .parallel(false)
            .skip_conflicting_divisions(false)
            .build();
        let (_, graph) = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap();
        assert_eq!(graph.stats().variables.divisions, 1);
    }

    #[test]
    fn test_non_finite_cost_is_an_error() {
        let store = HypothesisStore::from_segments(vec![vec![seg(1, 0, 0)], vec![seg(2, 1, 0)]])
            .unwrap();
        let costs = TableCosts::new().with_movement(1, 2, f64::NAN);
        let cfg = config();
        let err = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap_err();
        assert!(matches!(err, TrackingError::NonFiniteCost { ref event, .. } if event.starts_with("movement")));

        let costs = TableCosts::new().with_segment(2, f64::INFINITY);
        let err = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap_err();
        assert!(matches!(err, TrackingError::NonFiniteCost { .. }));
    }

    #[test]
    fn test_flow_rows_hold_for_a_consistent_track() {
        let store = HypothesisStore::from_segments(vec![vec![seg(1, 0, 0)], vec![seg(2, 1, 0)]])
            .unwrap();
        let costs = TableCosts::new().with_movement(1, 2, 0.0);
        let cfg = config();
        let (_, graph) = TrackingModelBuilder::new(&cfg, &costs)
            .build_from_store(&store)
            .unwrap();
        let mut values = vec![false; graph.num_variables()];
        let a = graph.node(SegmentKey::new(0, 0)).unwrap();
        let c = graph.node(SegmentKey::new(1, 0)).unwrap();
        values[a.active.0] = true;
        values[c.active.0] = true;
        values[a.moves_out[0].0] = true;
        let assignment = Assignment::new(&graph, values.clone()).unwrap();
        assert!(graph.check_assignment(&assignment).is_ok());

        // Dropping the movement leaves both sides unexplained.
        values[a.moves_out[0].0] = false;
        let assignment = Assignment::new(&graph, values).unwrap();
        assert_eq!(graph.violations(&assignment).len(), 2);
    }

    #[test]
    fn test_parallel_build_is_identical() {
        let frames: Vec<Vec<Segment>> = (0..4)
            .map(|f| (0..3).map(|i| seg((f * 10 + i) as u64, f, i as i64 * 5)).collect())
            .collect();
        let store = HypothesisStore::from_segments(frames).unwrap();
        let costs = crate::costs::GeometricCosts::default();
        let seq = TrackingModelBuilder::new(&config(), &costs)
            .build_from_store(&store)
            .unwrap();
        let par_cfg = TrackingConfig::builder().parallel(true).build();
        let par = TrackingModelBuilder::new(&par_cfg, &costs)
            .build_from_store(&store)
            .unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn test_conflict_graphs_must_match_store() {
        let store = HypothesisStore::from_segments(vec![vec![seg(1, 0, 0)], vec![]]).unwrap();
        let costs = TableCosts::new();
        let cfg = config();
        let builder = TrackingModelBuilder::new(&cfg, &costs);
        let conflicts = build_conflict_graphs(&store, false).unwrap();
        assert!(matches!(
            builder.build(&store, &conflicts[..1]),
            Err(TrackingError::Configuration(_))
        ));
        let swapped = vec![conflicts[1].clone(), conflicts[0].clone()];
        assert!(matches!(
            builder.build(&store, &swapped),
            Err(TrackingError::NonContiguousFrames { expected: 0, found: 1 })
        ));
    }
}
