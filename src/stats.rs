//! Artifact introspection: where the bytes of a function actually go.

use std::fmt;

use crate::csf::Csf;
use crate::multiset::MultisetCsf;
use crate::value::Value;

/// Size and shape summary of a built function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsfStats {
    pub num_buckets: usize,
    /// Sum of per-bucket solution lengths, in bits.
    pub solution_bits: usize,
    /// Largest single bucket solution, in bits.
    pub max_bucket_bits: usize,
    pub max_code_length: u32,
    pub num_symbols: usize,
    /// Pre-filter footprint, zero when none is configured.
    pub filter_bytes: usize,
    /// Whole-artifact footprint (solutions + seeds + filter).
    pub total_bytes: usize,
}

impl fmt::Display for CsfStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buckets, {} solution bits (max {}), {} symbols up to {} bits, \
             filter {} B, total {} B",
            self.num_buckets,
            self.solution_bits,
            self.max_bucket_bits,
            self.num_symbols,
            self.max_code_length,
            self.filter_bytes,
            self.total_bytes
        )
    }
}

impl<V: Value> Csf<V> {
    pub fn stats(&self) -> CsfStats {
        let solution_bits = self.solution_bit_lengths().sum();
        let max_bucket_bits = self.solution_bit_lengths().max().unwrap_or(0);
        let filter_bytes = self.prefilter().map_or(0, |p| p.size_in_bytes());
        CsfStats {
            num_buckets: self.num_buckets(),
            solution_bits,
            max_bucket_bits,
            max_code_length: self.max_code_length(),
            num_symbols: self.num_symbols(),
            filter_bytes,
            total_bytes: self.size_in_bytes(),
        }
    }
}

impl<V: Value> MultisetCsf<V> {
    /// Per-column stats, in column order.
    pub fn stats(&self) -> Vec<CsfStats> {
        (0..self.num_columns())
            .map(|col| self.column(col).stats())
            .collect()
    }
}
