use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;
use xxhash_rust::xxh3::xxh3_64_with_seed;

use crate::bits::BitArray;
use crate::error::CsfError;
use crate::serial;

/// Classic Bloom filter over raw key bytes. Every position is taken as
/// `hash mod num_bits`; the k hashes are the same keyed hash under seeds
/// `0..k`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: BitArray,
    num_hashes: usize,
}

impl BloomFilter {
    /// Size and hash count tuned for `error_rate` false positives over
    /// `num_elements` keys: `bits = ceil(log2(e)^2 * log2(1/eps) * n)` and
    /// `k = round(bits/n * ln 2)`.
    pub fn autotuned(num_elements: usize, error_rate: f64) -> Result<Self, CsfError> {
        let num_bits = Self::autotuned_bits(num_elements, error_rate)?;
        let optimal = num_bits as f64 / num_elements as f64 * std::f64::consts::LN_2;
        let num_hashes = (optimal.round() as usize).max(1);
        debug!("bloom filter: {num_bits} bits, k={num_hashes} (optimal {optimal:.2})");
        Ok(Self::fixed(num_bits, num_hashes))
    }

    /// Autotuned size with a caller-chosen hash count.
    pub fn autotuned_fixed_k(
        num_elements: usize,
        error_rate: f64,
        num_hashes: usize,
    ) -> Result<Self, CsfError> {
        if num_hashes == 0 {
            return Err(CsfError::FilterConstruction(
                "bloom filter needs at least one hash".to_string(),
            ));
        }
        let num_bits = Self::autotuned_bits(num_elements, error_rate)?;
        debug!("bloom filter: {num_bits} bits, k={num_hashes} (fixed)");
        Ok(Self::fixed(num_bits, num_hashes))
    }

    pub fn fixed(num_bits: usize, num_hashes: usize) -> Self {
        Self {
            bits: BitArray::new(num_bits.max(1)),
            num_hashes,
        }
    }

    fn autotuned_bits(num_elements: usize, error_rate: f64) -> Result<usize, CsfError> {
        if num_elements == 0 {
            return Err(CsfError::FilterConstruction(
                "bloom filter over zero elements".to_string(),
            ));
        }
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(CsfError::FilterConstruction(format!(
                "error rate {error_rate} outside (0, 1)"
            )));
        }
        let log2_e = std::f64::consts::LOG2_E;
        let bits = (log2_e * log2_e * (1.0 / error_rate).log2() * num_elements as f64).ceil();
        Ok(bits as usize)
    }

    pub fn add(&mut self, key: &[u8]) {
        let num_bits = self.bits.num_bits() as u64;
        for seed in 0..self.num_hashes as u64 {
            let position = xxh3_64_with_seed(key, seed) % num_bits;
            self.bits.set(position as usize);
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let num_bits = self.bits.num_bits() as u64;
        (0..self.num_hashes as u64)
            .all(|seed| self.bits.get((xxh3_64_with_seed(key, seed) % num_bits) as usize))
    }

    #[inline]
    pub fn num_bits(&self) -> usize {
        self.bits.num_bits()
    }

    #[inline]
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    pub fn size_in_bytes(&self) -> usize {
        self.bits.num_bits().div_ceil(8)
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u64(writer, self.bits.num_bits() as u64)?;
        serial::write_bytes(writer, &self.bits.to_le_bytes())?;
        serial::write_u64(writer, self.num_hashes as u64)
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let num_bits = serial::read_u64(reader)? as usize;
        let bytes = serial::read_vec(reader, num_bits.div_ceil(8))?;
        let bits = BitArray::from_le_bytes(&bytes, num_bits)?;
        let num_hashes = serial::read_u64(reader)? as usize;
        Ok(Self { bits, num_hashes })
    }
}
