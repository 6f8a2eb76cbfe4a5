use crate::bits::BitArray;
use crate::system::SparseSystem;

/// Result of peeling a sparse system viewed as a 3-uniform hypergraph
/// (variables are vertices, equations are edges).
///
/// `solution_order` lists peeled variables last-peeled-first, so iterating it
/// forward is a valid back-substitution order; `peeled_ids[i]` is the unique
/// equation that solves `solution_order[i]`.
pub struct PeelOutput {
    pub unpeeled_ids: Vec<u32>,
    pub peeled_ids: Vec<u32>,
    pub solution_order: Vec<u32>,
}

/// Greedily peel degree-1 variables.
///
/// A variable of degree 1 appears in exactly one unpeeled equation; that
/// equation can be deferred entirely to back-substitution. Removing it may
/// drop other variables to degree 1, so the process cascades until no
/// degree-1 variable remains. `xors[v]` accumulates the XOR of ids of the
/// unpeeled equations containing `v`, which for a degree-1 variable *is* the
/// one remaining equation id.
pub fn peel_hypergraph(system: &SparseSystem, equation_ids: &[u32]) -> PeelOutput {
    let num_equations = system.num_equations();
    let num_variables = system.solution_size();

    let mut degree = vec![0u32; num_variables];
    let mut xors = vec![0u32; num_variables];
    let mut peeled = vec![false; num_equations];

    for &id in equation_ids {
        let (vars, _) = system.equation(id);
        for &var in vars {
            degree[var as usize] += 1;
            xors[var as usize] ^= id;
        }
    }

    let mut vertex_stack: Vec<u32> = Vec::new();
    // Reused across cascades to avoid reallocation.
    let mut pending: Vec<u32> = Vec::new();

    for start_var in 0..num_variables as u32 {
        if degree[start_var as usize] != 1 {
            continue;
        }
        pending.clear();
        pending.push(start_var);
        let mut processed = 0;
        while processed < pending.len() {
            let var = pending[processed];
            processed += 1;
            // Degree 0: its equation was peeled from another endpoint.
            // Degree > 1: not peelable (yet).
            if degree[var as usize] != 1 {
                continue;
            }
            vertex_stack.push(var);
            let equation_id = xors[var as usize];
            peeled[equation_id as usize] = true;

            let (vars, _) = system.equation(equation_id);
            for &other in vars {
                degree[other as usize] -= 1;
                if other != var {
                    xors[other as usize] ^= equation_id;
                }
            }
            // De-duplicate the vertex set before scanning for freed-up
            // variables, so a repeated endpoint is queued once.
            let mut seen: [Option<u32>; 3] = [None; 3];
            for (slot, &other) in vars.iter().enumerate() {
                if seen[..slot].contains(&Some(other)) {
                    continue;
                }
                seen[slot] = Some(other);
                if degree[other as usize] == 1 {
                    pending.push(other);
                }
            }
        }
    }

    let unpeeled_ids: Vec<u32> = equation_ids
        .iter()
        .copied()
        .filter(|&id| !peeled[id as usize])
        .collect();

    vertex_stack.reverse();
    let peeled_ids: Vec<u32> = vertex_stack
        .iter()
        .map(|&var| xors[var as usize])
        .collect();

    PeelOutput {
        unpeeled_ids,
        peeled_ids,
        solution_order: vertex_stack,
    }
}

/// Fold the peeled equations into a solution that already satisfies the
/// unpeeled residue. Each peeled variable is fixed so its equation holds,
/// in last-peeled-first order.
pub fn back_substitute(peel: &PeelOutput, system: &SparseSystem, solution: &mut BitArray) {
    for (&var, &equation_id) in peel.solution_order.iter().zip(&peel.peeled_ids) {
        let (vars, constant) = system.equation(equation_id);
        let mut acc = constant;
        for &other in vars {
            if other != var {
                acc ^= solution.get(other as usize);
            }
        }
        if acc {
            solution.set(var as usize);
        } else {
            solution.clear(var as usize);
        }
    }
}
