use log::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bits::BitArray;
use crate::csf::Csf;
use crate::entropy::entropy_permutation;
use crate::error::CsfError;
use crate::filter::{FilterConfig, apply_prefilter};
use crate::hash::{Signature, start_positions};
use crate::huffman::HuffmanTable;
use crate::multiset::MultisetCsf;
use crate::solve::solve_sparse_system;
use crate::store::partition_to_buckets;
use crate::system::SparseSystem;
use crate::value::Value;

/// Variables per equation, as a ratio. 1.10 keeps the per-bucket system
/// solvable with very high probability once lazy elimination is in the
/// pipeline; without it the classic peelable threshold of 1.23 would apply.
const DELTA: f64 = 1.10;

/// Target equation count per bucket; bucket sizes derive from it.
const SUBSYSTEM_TARGET_BITS: f64 = 3500.0;
const MIN_BUCKET_SIZE: usize = 100;
const MAX_BUCKET_SIZE: usize = 1000;

/// Build parameters.
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    /// Optional approximate-membership pre-filter absorbing the most common
    /// value.
    pub filter: FilterConfig,
    /// Run the entropy-minimizing column permutation before a multiset
    /// build.
    pub permute_columns: bool,
    /// Promote per-column and per-store progress to info-level logging.
    pub verbose: bool,
}

/// Constructs [`Csf`] and [`MultisetCsf`] artifacts.
pub struct Builder {
    cfg: BuildConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            cfg: BuildConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: BuildConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.cfg.filter = filter;
        self
    }

    pub fn permute_columns(mut self, permute: bool) -> Self {
        self.cfg.permute_columns = permute;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.cfg.verbose = verbose;
        self
    }

    /// Build a function from **unique** keys to their values.
    pub fn build<K, V>(&self, keys: &[K], values: &[V]) -> Result<Csf<V>, CsfError>
    where
        K: AsRef<[u8]>,
        V: Value,
    {
        if keys.is_empty() {
            return Err(CsfError::ShapeMismatch("empty key set".to_string()));
        }
        if keys.len() != values.len() {
            return Err(CsfError::ShapeMismatch(format!(
                "{} keys but {} values",
                keys.len(),
                values.len()
            )));
        }
        let key_slices: Vec<&[u8]> = keys.iter().map(AsRef::as_ref).collect();
        construct_column(&self.cfg, key_slices, values.to_vec())
    }

    /// Build one function per column of `rows`; a query then returns the
    /// whole row. Every row must have the same width.
    pub fn build_multiset<K, V>(
        &self,
        keys: &[K],
        rows: &[Vec<V>],
    ) -> Result<MultisetCsf<V>, CsfError>
    where
        K: AsRef<[u8]>,
        V: Value,
    {
        if keys.is_empty() {
            return Err(CsfError::ShapeMismatch("empty key set".to_string()));
        }
        if keys.len() != rows.len() {
            return Err(CsfError::ShapeMismatch(format!(
                "{} keys but {} value rows",
                keys.len(),
                rows.len()
            )));
        }
        let num_cols = rows[0].len();
        if num_cols == 0 {
            return Err(CsfError::ShapeMismatch("zero-width value rows".to_string()));
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != num_cols) {
            return Err(CsfError::ShapeMismatch(format!(
                "ragged value matrix: expected width {num_cols}, found {}",
                bad.len()
            )));
        }

        let mut matrix: Vec<V> = Vec::with_capacity(keys.len() * num_cols);
        for row in rows {
            matrix.extend(row.iter().cloned());
        }
        if self.cfg.permute_columns {
            entropy_permutation(&mut matrix, keys.len(), num_cols);
        }

        let key_slices: Vec<&[u8]> = keys.iter().map(AsRef::as_ref).collect();
        let mut columns = Vec::with_capacity(num_cols);
        for col in 0..num_cols {
            if self.cfg.verbose {
                info!("building column {} of {num_cols}", col + 1);
            }
            let values: Vec<V> = (0..keys.len())
                .map(|row| matrix[row * num_cols + col].clone())
                .collect();
            columns.push(construct_column(&self.cfg, key_slices.clone(), values)?);
        }
        Ok(MultisetCsf::new(columns))
    }
}

/// Full single-column pipeline: pre-filter, code, bucket, solve, assemble.
fn construct_column<V: Value>(
    cfg: &BuildConfig,
    keys: Vec<&[u8]>,
    values: Vec<V>,
) -> Result<Csf<V>, CsfError> {
    let (prefilter, keys, values) = apply_prefilter(&cfg.filter, keys, values)?;

    let table = HuffmanTable::from_values(&values)?;

    let total_bits: u64 = values.iter().map(|v| table.codeword(v).len as u64).sum();
    let avg_bits_per_key = total_bits as f64 / values.len() as f64;
    let bucket_size = ((SUBSYSTEM_TARGET_BITS / avg_bits_per_key) as usize)
        .clamp(MIN_BUCKET_SIZE, MAX_BUCKET_SIZE);
    if cfg.verbose {
        info!(
            "{} pairs at {avg_bits_per_key:.2} bits/key, bucket size {bucket_size}",
            values.len()
        );
    }

    let store = partition_to_buckets(&keys, &values, bucket_size)?;
    debug!(
        "hash store: {} buckets under seed {}",
        store.num_buckets(),
        store.seed
    );

    #[cfg(feature = "parallel")]
    let solutions: Result<Vec<(BitArray, u64)>, CsfError> = store
        .key_buckets
        .par_iter()
        .zip(store.value_buckets.par_iter())
        .map(|(signatures, bucket_values)| solve_bucket(signatures, bucket_values, &table))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let solutions: Result<Vec<(BitArray, u64)>, CsfError> = store
        .key_buckets
        .iter()
        .zip(store.value_buckets.iter())
        .map(|(signatures, bucket_values)| solve_bucket(signatures, bucket_values, &table))
        .collect();

    Ok(Csf::new(
        solutions?,
        table.code_length_counts,
        table.ordered_symbols,
        store.seed,
        prefilter,
    ))
}

/// Seeds to try per bucket before giving up on its system.
const BUCKET_SEED_ATTEMPTS: u64 = 10;

fn solve_bucket<V: Value>(
    signatures: &[Signature],
    values: &[V],
    table: &HuffmanTable<V>,
) -> Result<(BitArray, u64), CsfError> {
    let num_equations: usize = values.iter().map(|v| table.codeword(v).len as usize).sum();
    // Three distinct start positions need at least three variables; an empty
    // bucket still gets a (trivial) solution so queries can land in it.
    let num_variables = ((num_equations as f64 * DELTA).ceil() as usize).max(3);

    for seed in 0..BUCKET_SEED_ATTEMPTS {
        let system = build_sparse_system(signatures, values, table, seed, num_variables);
        match solve_sparse_system(&system) {
            Ok(solution) => return Ok((solution, seed)),
            Err(CsfError::Unsolvable(reason)) => {
                debug!("bucket seed {seed} unsolvable: {reason}");
            }
            Err(other) => return Err(other),
        }
    }
    Err(CsfError::Unsolvable(format!(
        "bucket of {} keys unsolved after {BUCKET_SEED_ATTEMPTS} seeds",
        signatures.len()
    )))
}

/// One equation per code bit: the three windows starting at the key's start
/// positions, shifted by the bit offset (wrapping at the end of the solution
/// range), must XOR to that bit of the codeword.
fn build_sparse_system<V: Value>(
    signatures: &[Signature],
    values: &[V],
    table: &HuffmanTable<V>,
    seed: u64,
    num_variables: usize,
) -> SparseSystem {
    let num_equations: usize = values.iter().map(|v| table.codeword(v).len as usize).sum();
    let mut system = SparseSystem::new(num_variables, num_equations);
    for (signature, value) in signatures.iter().zip(values) {
        let codeword = table.codeword(value);
        let [a, b, c] = start_positions(*signature, seed, num_variables);
        for offset in 0..codeword.len as usize {
            let vars = [
                ((a + offset) % num_variables) as u32,
                ((b + offset) % num_variables) as u32,
                ((c + offset) % num_variables) as u32,
            ];
            let bit = (codeword.bits >> (codeword.len as usize - 1 - offset)) & 1 == 1;
            system.add_equation(vars, bit);
        }
    }
    system
}
