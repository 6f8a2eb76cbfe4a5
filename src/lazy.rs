use crate::bits::BitArray;
use crate::error::CsfError;
use crate::system::{DenseSystem, SparseSystem};

/// Result of lazy Gaussian elimination over the unpeeled equations.
///
/// `dense_ids` index the small residual subsystem handed to plain Gaussian
/// elimination. `solved_ids[i]` defines `solved_vars[i]` in terms of active
/// variables and is folded back in last-added-first order.
pub struct LazyOutput {
    pub dense_ids: Vec<u32>,
    pub solved_ids: Vec<u32>,
    pub solved_vars: Vec<u32>,
    pub dense: DenseSystem,
}

/// Partition the remaining variables into idle and active while harvesting
/// equations that touch at most one idle variable.
///
/// The priority of an equation is the number of idle variables it still
/// contains. Priority-0 equations are fully active and either join the dense
/// residual, vanish as identities, or expose a contradiction. A priority-1
/// equation pins its single idle variable: the variable is recorded as
/// solved and eliminated from every other equation containing it. When no
/// low-priority equation is pending, the least-weight idle variable is
/// activated (weight = number of equations containing it, ties by id).
pub fn lazy_elimination(
    system: &SparseSystem,
    equation_ids: &[u32],
) -> Result<LazyOutput, CsfError> {
    let num_equations = system.num_equations();
    let num_variables = system.solution_size();

    let mut variable_weight = vec![0u32; num_variables];
    let mut equation_priority = vec![0u32; num_equations];
    let mut var_to_equations: Vec<Vec<u32>> = vec![Vec::new(); num_variables];
    let mut dense = DenseSystem::new(num_variables);

    let mut deduped: Vec<u32> = Vec::with_capacity(3);
    for &id in equation_ids {
        let (vars, constant) = system.equation(id);
        // Keep only variables that appear an odd number of times: the query
        // XORs solution bits, so an even count cancels out entirely.
        deduped.clear();
        for &var in vars {
            if let Some(pos) = deduped.iter().position(|&v| v == var) {
                deduped.swap_remove(pos);
            } else {
                deduped.push(var);
            }
        }
        dense.add_equation(id, &deduped, constant);
        for &var in &deduped {
            variable_weight[var as usize] += 1;
            equation_priority[id as usize] += 1;
            var_to_equations[var as usize].push(id);
        }
    }

    // Equations currently at priority 0 or 1. Priorities only decrease, so
    // each equation enters this list exactly once.
    let mut pending: Vec<u32> = equation_ids
        .iter()
        .copied()
        .filter(|&id| equation_priority[id as usize] <= 1)
        .collect();

    let mut dense_ids = Vec::new();
    let mut solved_ids = Vec::new();
    let mut solved_vars = Vec::new();

    let mut idle = BitArray::new(num_variables.max(1));
    idle.set_all();

    // Ascending weight, ties by id; activation pops from the back.
    let mut activation_order = countsort_by_weight(&variable_weight, num_equations);
    activation_order.reverse();

    let mut remaining = equation_ids.len();
    while remaining > 0 {
        if let Some(id) = pending.pop() {
            remaining -= 1;
            match equation_priority[id as usize] {
                0 => {
                    let eq = dense.equation(id);
                    if eq.bits.any() {
                        // All variables active: part of the dense residual.
                        dense_ids.push(id);
                    } else if eq.constant {
                        return Err(CsfError::Unsolvable(format!(
                            "equation {id} has all coefficients zero but constant one"
                        )));
                    }
                    // Empty with constant zero: identity, drop.
                }
                1 => {
                    // Locate the pivot: the only idle variable left.
                    let mut masked = dense.equation(id).bits.clone();
                    masked.and_assign(&idle);
                    let Some(pivot) = masked.find_first_set() else {
                        // Stale priority cannot happen: priorities are
                        // updated eagerly on every elimination.
                        return Err(CsfError::Unsolvable(format!(
                            "equation {id} lost its idle variable"
                        )));
                    };
                    let pivot = pivot as u32;
                    solved_ids.push(id);
                    solved_vars.push(pivot);
                    // Weight zero makes the activation scan skip it.
                    variable_weight[pivot as usize] = 0;
                    for &other in &var_to_equations[pivot as usize] {
                        if other == id {
                            continue;
                        }
                        equation_priority[other as usize] -= 1;
                        if equation_priority[other as usize] == 1 {
                            pending.push(other);
                        }
                        dense.xor_equations(other, id);
                    }
                }
                _ => unreachable!("pending equation with priority > 1"),
            }
        } else {
            // No low-priority equation: activate the least-weight idle
            // variable and see whether that unlocks one.
            let variable = loop {
                let Some(candidate) = activation_order.pop() else {
                    return Err(CsfError::Unsolvable(
                        "ran out of idle variables with equations remaining".to_string(),
                    ));
                };
                if variable_weight[candidate as usize] != 0 {
                    break candidate;
                }
            };
            idle.clear(variable as usize);
            for &id in &var_to_equations[variable as usize] {
                equation_priority[id as usize] -= 1;
                if equation_priority[id as usize] == 1 {
                    pending.push(id);
                }
            }
        }
    }

    Ok(LazyOutput {
        dense_ids,
        solved_ids,
        solved_vars,
        dense,
    })
}

/// Fold the solved rows into a solution of the dense residual,
/// last-added-first: each row fixes its variable so the row holds under the
/// current partial solution.
pub fn back_substitute(
    solved_ids: &[u32],
    solved_vars: &[u32],
    dense: &DenseSystem,
    solution: &mut BitArray,
) {
    for (&id, &var) in solved_ids.iter().zip(solved_vars).rev() {
        let eq = dense.equation(id);
        if eq.constant ^ eq.bits.scalar_product(solution) {
            solution.set(var as usize);
        }
    }
}

/// Counting sort of variable ids by ascending weight, stable in id order.
fn countsort_by_weight(variable_weight: &[u32], num_equations: usize) -> Vec<u32> {
    let num_variables = variable_weight.len();
    let mut counts = vec![0u32; num_equations + 1];
    for &weight in variable_weight {
        counts[weight as usize] += 1;
    }
    let mut cumulated = 0u32;
    for count in counts.iter_mut() {
        cumulated += *count;
        *count = cumulated;
    }
    let mut sorted = vec![0u32; num_variables];
    for variable in (0..num_variables).rev() {
        let slot = &mut counts[variable_weight[variable] as usize];
        *slot -= 1;
        sorted[*slot as usize] = variable as u32;
    }
    sorted
}
