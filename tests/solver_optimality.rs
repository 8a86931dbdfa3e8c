//! The built-in backend against exhaustive enumeration.

mod helpers;

use helpers::{random_costs, random_store, sequential_config};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tracking_by_assignment_rs::{
    to_binary_program, BinaryProgram, BinarySolver, BranchAndBound, Relation, SolverConfig,
    SolverError, Tracker, TrackingModelBuilder,
};

/// Best objective over all 2^n assignments, `None` if nothing is feasible.
fn brute_force(program: &BinaryProgram) -> Option<f64> {
    let n = program.num_vars();
    assert!(n <= 20, "too many variables to enumerate: {}", n);
    let mut best: Option<f64> = None;
    for mask in 0u32..(1 << n) {
        let values: Vec<bool> = (0..n).map(|j| mask & (1 << j) != 0).collect();
        if program.is_feasible(&values) {
            let value = program.evaluate(&values);
            if best.map_or(true, |b| value < b) {
                best = Some(value);
            }
        }
    }
    best
}

fn random_program(rng: &mut StdRng) -> BinaryProgram {
    let n = rng.gen_range(1..=12);
    let mut program = BinaryProgram::new(n);
    for j in 0..n {
        program.add_cost(j, rng.gen_range(-5..=5) as f64);
    }
    for _ in 0..rng.gen_range(0..=6) {
        let arity = rng.gen_range(1..=n.min(4));
        let terms: Vec<(usize, f64)> = (0..arity)
            .map(|_| (rng.gen_range(0..n), rng.gen_range(-2..=2) as f64))
            .collect();
        let relation = match rng.gen_range(0..3) {
            0 => Relation::Le,
            1 => Relation::Eq,
            _ => Relation::Ge,
        };
        program.add_constraint(terms, relation, rng.gen_range(-1..=2) as f64);
    }
    program
}

fn solver(decompose: bool) -> BranchAndBound {
    BranchAndBound::new(SolverConfig {
        decompose,
        ..SolverConfig::default()
    })
}

#[test]
fn test_random_programs_match_enumeration() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut feasible = 0;
    for case in 0..300 {
        let program = random_program(&mut rng);
        let expected = brute_force(&program);
        for decompose in [true, false] {
            match (solver(decompose).solve(&program), expected) {
                (Ok(solution), Some(best)) => {
                    assert!(program.is_feasible(&solution.values), "case {}", case);
                    assert!(
                        (solution.objective - best).abs() < 1e-9,
                        "case {}: solver {} vs enumeration {}",
                        case,
                        solution.objective,
                        best
                    );
                    assert!((program.evaluate(&solution.values) - best).abs() < 1e-9);
                }
                (Err(SolverError::Infeasible), None) => {}
                (got, want) => panic!("case {}: solver {:?}, enumeration {:?}", case, got, want),
            }
        }
        feasible += expected.is_some() as usize;
    }
    // The generator must exercise both outcomes.
    assert!(feasible > 0 && feasible < 300);
}

#[test]
fn test_tracking_models_match_enumeration() {
    let mut rng = StdRng::seed_from_u64(2024);
    let config = sequential_config();
    let mut checked = 0;
    while checked < 100 {
        let store = random_store(&mut rng, 3, 2);
        let costs = random_costs(&mut rng, &store);
        let (_, graph) = TrackingModelBuilder::new(&config, &costs)
            .build_from_store(&store)
            .unwrap();
        if graph.num_variables() > 16 {
            continue;
        }
        let program = to_binary_program(&graph).unwrap();
        let best = brute_force(&program).expect("all-inactive is always feasible");

        let result = Tracker::new(config.clone(), costs).unwrap().track(&store).unwrap();
        assert!(
            (result.objective() - best).abs() < 1e-9,
            "tracker {} vs enumeration {}",
            result.objective(),
            best
        );
        checked += 1;
    }
}
