use crate::bits::BitArray;
use crate::error::CsfError;
use crate::system::SparseSystem;
use crate::{gauss, lazy, peel};

/// Solve a sparse modulo-2 system through the three-stage pipeline:
/// hypergraph peeling, lazy Gaussian elimination, dense Gaussian elimination,
/// then fold the lazy and peeled stages back in. The returned vector
/// satisfies every equation of the input system.
pub fn solve_sparse_system(system: &SparseSystem) -> Result<BitArray, CsfError> {
    let equation_ids: Vec<u32> = (0..system.num_equations() as u32).collect();

    let peeled = peel::peel_hypergraph(system, &equation_ids);
    let lazy_out = lazy::lazy_elimination(system, &peeled.unpeeled_ids)?;

    let mut dense = lazy_out.dense;
    let mut solution = gauss::gaussian_elimination(&mut dense, &lazy_out.dense_ids)?;
    lazy::back_substitute(
        &lazy_out.solved_ids,
        &lazy_out.solved_vars,
        &dense,
        &mut solution,
    );
    peel::back_substitute(&peeled, system, &mut solution);

    debug_assert!(system.is_satisfied_by(&solution));
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{Signature, start_positions};

    #[test]
    fn empty_system_yields_zero_solution() {
        let system = SparseSystem::new(3, 0);
        let solution = solve_sparse_system(&system).unwrap();
        assert_eq!(solution.num_bits(), 3);
        assert!(!solution.any());
    }

    #[test]
    fn randomized_systems_are_satisfied() {
        // Systems shaped like real buckets: three hash-derived positions per
        // equation, constants from the signature's low half.
        let mut solved = 0;
        for trial in 0..20u64 {
            let num_keys = 40 + trial as usize;
            let num_variables = (num_keys * 3 * 11).div_ceil(10).max(3);
            let mut system = SparseSystem::new(num_variables, num_keys * 3);
            for i in 0..num_keys {
                let sig = Signature::from_key(&(i as u64).to_le_bytes(), trial);
                let [a, b, c] = start_positions(sig, trial, num_variables);
                for offset in 0..3 {
                    let vars = [
                        ((a + offset) % num_variables) as u32,
                        ((b + offset) % num_variables) as u32,
                        ((c + offset) % num_variables) as u32,
                    ];
                    system.add_equation(vars, (sig.low >> offset) & 1 == 1);
                }
            }
            match solve_sparse_system(&system) {
                Ok(solution) => {
                    assert!(system.is_satisfied_by(&solution));
                    solved += 1;
                }
                // A random system at this density is occasionally singular;
                // the construction driver retries those with a fresh seed.
                Err(CsfError::Unsolvable(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(solved >= 15, "only {solved} of 20 systems solved");
    }

    #[test]
    fn contradiction_propagates() {
        let mut system = SparseSystem::new(3, 2);
        system.add_equation([0, 1, 2], true);
        system.add_equation([0, 1, 2], false);
        assert!(matches!(
            solve_sparse_system(&system),
            Err(CsfError::Unsolvable(_))
        ));
    }
}
