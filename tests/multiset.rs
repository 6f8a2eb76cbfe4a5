use compressed_static_function::{Builder, entropy, entropy_permutation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn numbered_keys(count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| format!("key{i}").into_bytes()).collect()
}

fn random_rows(num_rows: usize, num_cols: usize, seed: u64) -> Vec<Vec<u32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_rows)
        .map(|_| (0..num_cols).map(|_| rng.gen_range(0..60u32)).collect())
        .collect()
}

fn sorted(mut row: Vec<u32>) -> Vec<u32> {
    row.sort_unstable();
    row
}

#[test]
fn multiset_round_trips_per_column() {
    let keys = numbered_keys(4000);
    let rows: Vec<Vec<u32>> = (0..4000u32)
        .map(|i| vec![i % 5, i % 17, i / 1000])
        .collect();
    let multiset = Builder::new().build_multiset(&keys, &rows).unwrap();
    assert_eq!(multiset.num_columns(), 3);
    for (key, row) in keys.iter().zip(&rows) {
        assert_eq!(multiset.query(key), *row);
    }
}

#[cfg(feature = "parallel")]
#[test]
fn parallel_queries_match_sequential() {
    let keys = numbered_keys(2000);
    let rows: Vec<Vec<u32>> = (0..2000u32).map(|i| vec![i % 3, i % 11]).collect();
    let multiset = Builder::new().build_multiset(&keys, &rows).unwrap();
    for key in keys.iter().take(200) {
        assert_eq!(multiset.par_query(key), multiset.query(key));
    }
}

#[test]
fn permutation_lowers_entropy_and_preserves_rows() {
    let (num_rows, num_cols) = (1000, 10);
    let rows = random_rows(num_rows, num_cols, 3);

    let mut matrix: Vec<u32> = rows.iter().flatten().copied().collect();
    let column_entropy = |matrix: &[u32]| -> f64 {
        (0..num_cols)
            .map(|col| {
                let column: Vec<u32> =
                    (0..num_rows).map(|row| matrix[row * num_cols + col]).collect();
                entropy(&column)
            })
            .sum()
    };
    let before = column_entropy(&matrix);
    entropy_permutation(&mut matrix, num_rows, num_cols);
    let after = column_entropy(&matrix);
    assert!(after <= before + 1e-9, "entropy rose from {before} to {after}");
    for (row_index, row) in rows.iter().enumerate() {
        let permuted = matrix[row_index * num_cols..(row_index + 1) * num_cols].to_vec();
        assert_eq!(sorted(permuted), sorted(row.clone()));
    }
}

#[test]
fn permuted_multiset_round_trips_per_row() {
    let keys = numbered_keys(1000);
    let rows = random_rows(1000, 10, 5);
    let multiset = Builder::new()
        .permute_columns(true)
        .build_multiset(&keys, &rows)
        .unwrap();
    // Columns are reshuffled within each row, so compare row multisets.
    for (key, row) in keys.iter().zip(&rows) {
        assert_eq!(sorted(multiset.query(key)), sorted(row.clone()));
    }
}

#[test]
fn permuted_columns_are_cheaper_to_store() {
    let keys = numbered_keys(1500);
    // Every row holds the same three values in a random column order; after
    // permutation each column should be (nearly) constant.
    let mut rng = StdRng::seed_from_u64(9);
    let rows: Vec<Vec<u32>> = (0..1500)
        .map(|_| {
            let mut row = vec![111u32, 222, 333];
            let swap = rng.gen_range(0..3usize);
            row.swap(0, swap);
            let swap = rng.gen_range(1..3usize);
            row.swap(1, swap);
            row
        })
        .collect();
    let plain = Builder::new().build_multiset(&keys, &rows).unwrap();
    let permuted = Builder::new()
        .permute_columns(true)
        .build_multiset(&keys, &rows)
        .unwrap();
    assert!(
        permuted.size_in_bytes() < plain.size_in_bytes(),
        "permuted {} >= plain {}",
        permuted.size_in_bytes(),
        plain.size_in_bytes()
    );
}
