//! Shared builders and invariant checks for the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::Rng;

use tracking_by_assignment_rs::{
    Assignment, ConflictGraph, FactorGraph, HypothesisStore, Indicator, Region, Segment,
    SegmentKey, TableCosts, TrackingConfig,
};

pub fn rect(id: u64, frame: usize, x: i64, y: i64, w: i64, h: i64) -> Segment {
    Segment::new(id, frame, Region::rectangle(x, y, w, h))
}

pub fn key(frame: usize, index: usize) -> SegmentKey {
    SegmentKey::new(frame, index)
}

pub fn store(frames: Vec<Vec<Segment>>) -> HypothesisStore {
    HypothesisStore::from_segments(frames).expect("valid store")
}

pub fn sequential_config() -> TrackingConfig {
    TrackingConfig::builder().parallel(false).build()
}

// =============================================================================
// Random instances
// =============================================================================

/// Random small store: rectangles on a narrow strip, so overlaps are common.
///
/// Segment ids are `frame * 100 + index`.
pub fn random_store(rng: &mut StdRng, max_frames: usize, max_segments: usize) -> HypothesisStore {
    let num_frames = rng.gen_range(1..=max_frames);
    let frames = (0..num_frames)
        .map(|f| {
            let n = rng.gen_range(0..=max_segments);
            (0..n)
                .map(|i| {
                    rect(
                        (f * 100 + i) as u64,
                        f,
                        rng.gen_range(0..12),
                        rng.gen_range(0..3),
                        rng.gen_range(1..=3),
                        rng.gen_range(1..=3),
                    )
                })
                .collect()
        })
        .collect();
    store(frames)
}

/// Random cost table over every event of `store`; some transitions are left at the
/// forbidden default.
pub fn random_costs(rng: &mut StdRng, store: &HypothesisStore) -> TableCosts {
    let mut costs = TableCosts::new();
    for f in 0..store.num_frames() {
        for s in store.segments(f) {
            costs = costs
                .with_segment(s.id.0, rng.gen_range(-10..=2) as f64)
                .with_appearance(s.id.0, rng.gen_range(0..=6) as f64)
                .with_disappearance(s.id.0, rng.gen_range(0..=6) as f64);
        }
        let next = store.segments(f + 1);
        for s in store.segments(f) {
            for t in next {
                if rng.gen_bool(0.7) {
                    costs = costs.with_movement(s.id.0, t.id.0, rng.gen_range(0..=6) as f64);
                }
            }
            for a in 0..next.len() {
                for b in (a + 1)..next.len() {
                    if rng.gen_bool(0.3) {
                        costs = costs.with_division(
                            s.id.0,
                            (next[a].id.0, next[b].id.0),
                            rng.gen_range(0..=8) as f64,
                        );
                    }
                }
            }
        }
    }
    costs
}

/// Blobs drifting right by 2 px per frame. Every blob has a nested alternative,
/// and all but the last have a merged one spanning the gap to the next blob.
///
/// Segment ids are `frame * 1000 + blob * 10 + {0: whole, 1: nested, 2: merged}`.
pub fn drifting_blobs(n_frames: usize, n_blobs: usize) -> HypothesisStore {
    let frames = (0..n_frames)
        .map(|f| {
            let mut segments = Vec::new();
            for b in 0..n_blobs {
                let x = (b * 30 + 2 * f) as i64;
                let y = ((b % 3) * 10) as i64;
                let base = (f * 1000 + b * 10) as u64;
                segments.push(rect(base, f, x, y, 6, 6));
                segments.push(rect(base + 1, f, x + 1, y + 1, 3, 3));
                if b + 1 < n_blobs {
                    segments.push(rect(base + 2, f, x + 4, y, 20, 4));
                }
            }
            segments
        })
        .collect();
    store(frames)
}

// =============================================================================
// Invariant checks
// =============================================================================

/// Every overlapping pair of a frame shares at least one reported clique.
pub fn assert_conflict_soundness(store: &HypothesisStore, conflicts: &[ConflictGraph]) {
    for (f, graph) in conflicts.iter().enumerate() {
        let segments = store.segments(f);
        for i in 0..segments.len() {
            for j in (i + 1)..segments.len() {
                if segments[i].region.intersects(&segments[j].region) {
                    assert!(
                        graph.cliques().iter().any(|c| c.contains(i) && c.contains(j)),
                        "frame {}: overlapping pair ({}, {}) not covered",
                        f,
                        i,
                        j
                    );
                }
            }
        }
    }
}

/// At most one active member per clique.
pub fn assert_cliques_exclusive(
    graph: &FactorGraph,
    conflicts: &[ConflictGraph],
    assignment: &Assignment,
) {
    for conflict in conflicts {
        for clique in conflict.cliques() {
            let active = clique
                .members()
                .iter()
                .filter(|&&i| {
                    let node = graph.node(key(conflict.frame(), i)).expect("node");
                    assignment.value(node.active)
                })
                .count();
            assert!(
                active <= 1,
                "frame {}: {} active in clique {:?}",
                conflict.frame(),
                active,
                clique.members()
            );
        }
    }
}

/// Active segments before the last frame have exactly one explained future, and
/// both daughters of a selected division are active.
pub fn assert_flow_forward(graph: &FactorGraph, assignment: &Assignment) {
    let last = graph.num_frames().saturating_sub(1);
    for frame in 0..last {
        for node in graph.segment_nodes(frame) {
            let explained = node.outgoing().filter(|&v| assignment.value(v)).count()
                + node.disappearance.map_or(0, |v| assignment.value(v) as usize);
            let expected = assignment.value(node.active) as usize;
            assert_eq!(explained, expected, "segment {} forward flow", node.key);

            for &var in &node.divisions_out {
                if !assignment.value(var) {
                    continue;
                }
                let Some(Indicator::Division { to, .. }) =
                    graph.variable(var).map(|v| v.indicator)
                else {
                    panic!("{} is not a division", var);
                };
                for daughter in to {
                    let d = graph.node(daughter).expect("daughter node");
                    assert!(assignment.value(d.active), "daughter {} inactive", daughter);
                }
            }
        }
    }
}

/// Active segments after the first frame have exactly one explained past.
pub fn assert_flow_backward(graph: &FactorGraph, assignment: &Assignment) {
    for frame in 1..graph.num_frames() {
        for node in graph.segment_nodes(frame) {
            let explained = node.incoming().filter(|&v| assignment.value(v)).count()
                + node.appearance.map_or(0, |v| assignment.value(v) as usize);
            let expected = assignment.value(node.active) as usize;
            assert_eq!(explained, expected, "segment {} backward flow", node.key);
        }
    }
}
