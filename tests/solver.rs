use compressed_static_function::gauss::gaussian_elimination;
use compressed_static_function::hash::{Signature, splitmix64, start_positions};
use compressed_static_function::lazy::{self, lazy_elimination};
use compressed_static_function::peel::{self, peel_hypergraph};
use compressed_static_function::solve::solve_sparse_system;
use compressed_static_function::system::SparseSystem;
use compressed_static_function::CsfError;

/// A bucket-shaped system: `num_keys` keys, each contributing `bits` chained
/// equations from three hash-derived start positions.
fn bucket_system(num_keys: usize, bits: usize, trial: u64) -> SparseSystem {
    let num_equations = num_keys * bits;
    let num_variables = (num_equations * 11).div_ceil(10).max(3);
    let mut system = SparseSystem::new(num_variables, num_equations);
    for i in 0..num_keys {
        let sig = Signature::from_key(&splitmix64(i as u64 ^ trial).to_le_bytes(), trial);
        let [a, b, c] = start_positions(sig, trial, num_variables);
        for offset in 0..bits {
            system.add_equation(
                [
                    ((a + offset) % num_variables) as u32,
                    ((b + offset) % num_variables) as u32,
                    ((c + offset) % num_variables) as u32,
                ],
                (sig.low >> offset) & 1 == 1,
            );
        }
    }
    system
}

#[test]
fn pipeline_solutions_satisfy_the_original_system() {
    let mut solved = 0;
    for trial in 0..30u64 {
        let system = bucket_system(150 + trial as usize * 7, 4, trial);
        match solve_sparse_system(&system) {
            Ok(solution) => {
                assert_eq!(solution.num_bits(), system.solution_size());
                assert!(system.is_satisfied_by(&solution));
                solved += 1;
            }
            Err(CsfError::Unsolvable(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    // At delta = 1.10 the odd singular system is expected, not the rule.
    assert!(solved >= 25, "only {solved} of 30 systems solved");
}

#[test]
fn peel_then_lazy_partitions_the_equations() {
    let system = bucket_system(400, 3, 99);
    let all_ids: Vec<u32> = (0..system.num_equations() as u32).collect();
    let peeled = peel_hypergraph(&system, &all_ids);
    assert_eq!(
        peeled.peeled_ids.len() + peeled.unpeeled_ids.len(),
        system.num_equations()
    );
    assert_eq!(peeled.peeled_ids.len(), peeled.solution_order.len());

    if let Ok(lazy_out) = lazy_elimination(&system, &peeled.unpeeled_ids) {
        // Every unpeeled equation ends as dense, solved, or an identity.
        assert!(
            lazy_out.dense_ids.len() + lazy_out.solved_ids.len() <= peeled.unpeeled_ids.len()
        );
    }
}

#[test]
fn peeled_variables_are_exclusive_to_later_equations() {
    let system = bucket_system(200, 3, 5);
    let all_ids: Vec<u32> = (0..system.num_equations() as u32).collect();
    let peeled = peel_hypergraph(&system, &all_ids);
    // solution_order[i] must not occur in any equation peeled after it
    // (earlier in the reversed arrays), otherwise back-substitution would
    // overwrite an already-consumed variable.
    for i in 0..peeled.solution_order.len() {
        let variable = peeled.solution_order[i];
        for &earlier in &peeled.peeled_ids[..i] {
            let (vars, _) = system.equation(earlier);
            assert!(
                !vars.contains(&variable),
                "variable {variable} reappears in equation {earlier}"
            );
        }
    }
}

#[test]
fn full_back_substitution_covers_peeled_equations() {
    for trial in 40..50u64 {
        let system = bucket_system(120, 2, trial);
        let all_ids: Vec<u32> = (0..system.num_equations() as u32).collect();
        let peeled = peel_hypergraph(&system, &all_ids);
        let Ok(lazy_out) = lazy_elimination(&system, &peeled.unpeeled_ids) else {
            continue;
        };
        let mut dense = lazy_out.dense;
        let Ok(mut solution) = gaussian_elimination(&mut dense, &lazy_out.dense_ids) else {
            continue;
        };
        lazy::back_substitute(
            &lazy_out.solved_ids,
            &lazy_out.solved_vars,
            &dense,
            &mut solution,
        );
        peel::back_substitute(&peeled, &system, &mut solution);
        assert!(system.is_satisfied_by(&solution));
    }
}

#[test]
fn engineered_contradiction_surfaces_as_unsolvable() {
    // Two equations over one variable set with different constants cannot be
    // satisfied regardless of stage.
    let mut system = SparseSystem::new(6, 4);
    system.add_equation([0, 1, 2], true);
    system.add_equation([0, 1, 2], false);
    system.add_equation([3, 4, 5], true);
    system.add_equation([2, 3, 4], false);
    assert!(matches!(
        solve_sparse_system(&system),
        Err(CsfError::Unsolvable(_))
    ));
}

#[test]
fn solution_vector_length_tracks_solution_size() {
    let mut system = SparseSystem::new(10, 1);
    system.add_equation([1, 5, 9], true);
    let solution = solve_sparse_system(&system).unwrap();
    assert_eq!(solution.num_bits(), 10);
    let mut acc = false;
    for var in [1usize, 5, 9] {
        acc ^= solution.get(var);
    }
    assert!(acc);
}
