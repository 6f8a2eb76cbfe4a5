use hashbrown::HashMap;

use crate::bits::BitArray;
use crate::error::CsfError;
use crate::system::DenseSystem;

/// Plain Gaussian elimination over GF(2) on the dense residual.
///
/// Reduces the listed equations to row-echelon form by leading-variable
/// bookkeeping, then back-substitutes in reverse into a fresh solution
/// vector. Identity rows are skipped; an all-zero row with constant one is a
/// contradiction.
pub fn gaussian_elimination(
    system: &mut DenseSystem,
    equation_ids: &[u32],
) -> Result<BitArray, CsfError> {
    let mut first_vars: HashMap<u32, usize> = HashMap::with_capacity(equation_ids.len());
    for &id in equation_ids {
        first_vars.insert(id, system.first_var(id)?);
    }

    let num_equations = equation_ids.len();
    for top_index in 0..num_equations.saturating_sub(1) {
        for bot_index in top_index + 1..num_equations {
            let top_id = equation_ids[top_index];
            let bot_id = equation_ids[bot_index];

            if first_vars[&top_id] == first_vars[&bot_id] {
                // Both rows lead with the same variable: eliminate it from
                // the lower row.
                system.xor_equations(bot_id, top_id);
                let first_var = system.first_var(bot_id)?;
                first_vars.insert(bot_id, first_var);
            }

            if first_vars[&top_id] > first_vars[&bot_id] {
                system.swap_equations(top_id, bot_id);
                let top = first_vars[&top_id];
                let bot = first_vars[&bot_id];
                first_vars.insert(top_id, bot);
                first_vars.insert(bot_id, top);
            }
        }
    }

    let solution_size = system.solution_size();
    let mut solution = BitArray::new(solution_size.max(1));
    for &id in equation_ids.iter().rev() {
        let first_var = first_vars[&id];
        if first_var == solution_size {
            continue; // identity row
        }
        let eq = system.equation(id);
        if eq.constant ^ eq.bits.scalar_product(&solution) {
            solution.set(first_var);
        }
    }

    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(solution_size: usize, rows: &[(&[u32], bool)]) -> (DenseSystem, Vec<u32>) {
        let mut system = DenseSystem::new(solution_size);
        for (id, (vars, constant)) in rows.iter().enumerate() {
            system.add_equation(id as u32, vars, *constant);
        }
        (system, (0..rows.len() as u32).collect())
    }

    fn satisfies(system: &DenseSystem, ids: &[u32], solution: &BitArray) -> bool {
        ids.iter().all(|&id| {
            let eq = system.equation(id);
            eq.bits.scalar_product(solution) == eq.constant
        })
    }

    #[test]
    fn solves_full_rank_system() {
        let rows: &[(&[u32], bool)] = &[
            (&[0, 1], true),
            (&[1, 2], false),
            (&[0, 2], true),
        ];
        let (mut system, ids) = dense(3, rows);
        let check = dense(3, rows).0;
        let solution = gaussian_elimination(&mut system, &ids).unwrap();
        assert!(satisfies(&check, &ids, &solution));
    }

    #[test]
    fn reports_contradiction() {
        let rows: &[(&[u32], bool)] = &[(&[0, 1], true), (&[0, 1], false)];
        let (mut system, ids) = dense(3, rows);
        assert!(matches!(
            gaussian_elimination(&mut system, &ids),
            Err(CsfError::Unsolvable(_))
        ));
    }

    #[test]
    fn tolerates_redundant_rows() {
        let rows: &[(&[u32], bool)] = &[
            (&[0, 1, 2], true),
            (&[1, 2], true),
            (&[0], false),
        ];
        let (mut system, ids) = dense(3, rows);
        let check = dense(3, rows).0;
        let solution = gaussian_elimination(&mut system, &ids).unwrap();
        assert!(satisfies(&check, &ids, &solution));
    }
}
