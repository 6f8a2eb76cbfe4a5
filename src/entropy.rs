//! Greedy entropy-minimizing column permutation.
//!
//! Rearranges values *within each row* of a row-major matrix so that
//! frequent values pile into the same column, lowering the sum of per-column
//! zero-order entropies before a multiset function is built over the matrix.
//! The per-row multiset is preserved: only the column assignment changes.

use ahash::AHashMap;
use log::debug;

use crate::value::Value;

/// Zero-order empirical entropy of a value sequence, in bits per symbol.
pub fn entropy<V: Value>(values: &[V]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut frequencies: AHashMap<&V, usize> = AHashMap::new();
    for value in values {
        *frequencies.entry(value).or_insert(0) += 1;
    }
    let total = values.len() as f64;
    frequencies
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Permute `matrix` (row-major, `num_rows` × `num_cols`) in place.
///
/// Greedy: repeatedly pick the (value, column) pair that can place the value
/// into that column for the most rows at once, perform those within-row
/// swaps, and fix the affected cells. Two early exits keep the argmax cheap:
/// no remaining frequency class can beat the current best, and a pair that
/// covers its value's full frequency cannot be beaten at all. Values left
/// with a single relocatable row are optimal wherever they already are.
pub fn entropy_permutation<V: Value>(matrix: &mut [V], num_rows: usize, num_cols: usize) {
    assert_eq!(matrix.len(), num_rows * num_cols, "matrix shape mismatch");
    if num_rows == 0 || num_cols < 2 {
        return;
    }

    // eligible_rows[c]: rows whose cell in column c is still unassigned.
    // Kept sorted for linear-time intersections and differences.
    let mut eligible_rows: Vec<Vec<u32>> =
        vec![(0..num_rows as u32).collect(); num_cols];
    let mut assigned = vec![false; num_rows * num_cols];

    // val_to_rows[v]: sorted rows where v still sits in an unassigned cell.
    let mut val_to_rows: AHashMap<V, Vec<u32>> = AHashMap::new();
    for row in 0..num_rows {
        for col in 0..num_cols {
            let value = &matrix[row * num_cols + col];
            let rows = val_to_rows.entry(value.clone()).or_default();
            if rows.last() != Some(&(row as u32)) {
                rows.push(row as u32);
            }
        }
    }

    // frequency_map[f]: values relocatable in exactly f rows.
    let max_frequency = val_to_rows.values().map(Vec::len).max().unwrap_or(0);
    let mut frequency_map: Vec<Vec<V>> = vec![Vec::new(); max_frequency + 1];
    for (value, rows) in &val_to_rows {
        frequency_map[rows.len()].push(value.clone());
    }

    let mut passes = 0usize;
    loop {
        // Singletons are optimal wherever they sit.
        frequency_map[1].clear();

        let mut best: Option<(V, usize, Vec<u32>)> = None;
        let mut best_size = 0usize;
        'argmax: for frequency in (2..=max_frequency).rev() {
            if frequency <= best_size {
                break;
            }
            for value in &frequency_map[frequency] {
                let rows = &val_to_rows[value];
                for col in 0..num_cols {
                    let inter = intersect(&eligible_rows[col], rows);
                    if inter.len() > best_size {
                        best_size = inter.len();
                        best = Some((value.clone(), col, inter));
                    }
                    if best_size == frequency {
                        break 'argmax;
                    }
                }
            }
        }

        let Some((value, col, rows)) = best else {
            break;
        };
        passes += 1;

        // Move one unassigned occurrence of the value into `col` for every
        // covered row; the displaced cell stays unassigned in its new spot.
        for &row in &rows {
            let base = row as usize * num_cols;
            let from = (0..num_cols)
                .find(|&j| matrix[base + j] == value && !assigned[base + j])
                .expect("value tracked as relocatable in this row");
            matrix.swap(base + from, base + col);
            assigned[base + col] = true;
        }

        eligible_rows[col] = difference(&eligible_rows[col], &rows);

        // Rows that ran out of unassigned copies of the value leave its index.
        let old_rows = val_to_rows.remove(&value).unwrap_or_default();
        let old_frequency = old_rows.len();
        let mut remaining = Vec::with_capacity(old_rows.len());
        for &row in &old_rows {
            let base = row as usize * num_cols;
            let still_unassigned = (0..num_cols)
                .any(|j| matrix[base + j] == value && !assigned[base + j]);
            if still_unassigned {
                remaining.push(row);
            }
        }
        if let Some(slot) = frequency_map[old_frequency]
            .iter()
            .position(|v| *v == value)
        {
            frequency_map[old_frequency].swap_remove(slot);
        }
        if !remaining.is_empty() {
            frequency_map[remaining.len()].push(value.clone());
            val_to_rows.insert(value, remaining);
        }
    }
    debug!("entropy permutation converged after {passes} placements");
}

fn intersect(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn difference(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::new();
    let mut j = 0;
    for &x in a {
        while j < b.len() && b[j] < x {
            j += 1;
        }
        if j < b.len() && b[j] == x {
            continue;
        }
        out.push(x);
    }
    out
}
