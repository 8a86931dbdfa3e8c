//! Property tests over random small tracking instances.
//!
//! Every instance is generated from a seed, so a shrunk failure reproduces with
//! `random_store` / `random_costs` on the reported seed.

mod helpers;

use helpers::{
    assert_cliques_exclusive, assert_conflict_soundness, assert_flow_backward,
    assert_flow_forward, random_costs, random_store, sequential_config,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tracking_by_assignment_rs::{decode_lineages, Assignment, Tracker, TrackingConfig};

const MAX_FRAMES: usize = 3;
const MAX_SEGMENTS: usize = 3;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_solution_respects_conflicts_and_flow(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = random_store(&mut rng, MAX_FRAMES, MAX_SEGMENTS);
        let costs = random_costs(&mut rng, &store);

        let result = Tracker::new(sequential_config(), costs).unwrap().track(&store).unwrap();

        assert_conflict_soundness(&store, &result.conflicts);
        assert_cliques_exclusive(&result.graph, &result.conflicts, &result.assignment);
        assert_flow_forward(&result.graph, &result.assignment);
        assert_flow_backward(&result.graph, &result.assignment);
        prop_assert!(result.graph.violations(&result.assignment).is_empty());
    }

    #[test]
    fn test_optimum_never_worse_than_empty_tracking(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = random_store(&mut rng, MAX_FRAMES, MAX_SEGMENTS);
        let costs = random_costs(&mut rng, &store);

        let result = Tracker::new(sequential_config(), costs).unwrap().track(&store).unwrap();
        let empty = Assignment::all_false(&result.graph);

        prop_assert!(result.graph.check_assignment(&empty).is_ok());
        prop_assert!(result.objective() <= result.graph.objective(&empty) + 1e-9);
        prop_assert!((result.objective() - result.graph.objective(&result.assignment)).abs() < 1e-9);
    }

    #[test]
    fn test_decoding_labels_every_active_segment(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = random_store(&mut rng, MAX_FRAMES, MAX_SEGMENTS);
        let costs = random_costs(&mut rng, &store);

        let result = Tracker::new(sequential_config(), costs).unwrap().track(&store).unwrap();
        let lineages = &result.lineages;

        let mut active = 0;
        for frame in 0..result.graph.num_frames() {
            for node in result.graph.segment_nodes(frame) {
                let is_active = result.assignment.value(node.active);
                prop_assert_eq!(lineages.lineage_of(node.key).is_some(), is_active);
                active += is_active as usize;
            }
        }
        prop_assert_eq!(lineages.labels().count(), active);
        prop_assert_eq!(
            lineages.lineages().iter().map(|l| l.len()).sum::<usize>(),
            active
        );

        // Decoding is a pure function of the assignment.
        let again = decode_lineages(&result.graph, &result.assignment);
        prop_assert!(again.is_relabeling_of(lineages));
        prop_assert_eq!(&again, lineages);
    }

    #[test]
    fn test_parallel_and_sequential_runs_agree(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = random_store(&mut rng, MAX_FRAMES, MAX_SEGMENTS);
        let costs = random_costs(&mut rng, &store);

        let sequential = Tracker::new(sequential_config(), costs.clone())
            .unwrap()
            .track(&store)
            .unwrap();
        let parallel = Tracker::new(TrackingConfig::default(), costs)
            .unwrap()
            .track(&store)
            .unwrap();

        prop_assert_eq!(&sequential.conflicts, &parallel.conflicts);
        prop_assert_eq!(sequential.graph.stats(), parallel.graph.stats());
        prop_assert_eq!(&sequential.assignment, &parallel.assignment);
        prop_assert_eq!(&sequential.lineages, &parallel.lineages);
    }
}
