//! Approximate-membership pre-filters.
//!
//! A pre-filter absorbs the most frequent value of a column: the filter is
//! built over every key whose value differs from it, so a *definitely not*
//! answer at query time short-circuits to the absorbed value and the
//! function itself only has to encode the minority. Keys the filter
//! (falsely) claims are minority keys stay in the function with their true
//! value, so answers remain exact.

pub mod bloom;
pub mod fuse;
pub mod xor;

use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use hashbrown::HashMap;
use log::debug;
use xxhash_rust::xxh3::xxh3_64_with_seed;

pub use bloom::BloomFilter;
pub use fuse::BinaryFuseFilter;
pub use xor::XorFilter;

use crate::error::CsfError;
use crate::serial;
use crate::value::Value;

/// Seed for collapsing key bytes to the 64-bit hashes the fingerprint
/// filters consume. Fixed so a persisted filter keeps answering the same
/// way after a reload.
const KEY_HASH_SEED: u64 = 0x0C0F_FEE0_0D15_EA5E;

/// Which pre-filter to put in front of a function, if any.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterConfig {
    None,
    Bloom {
        error_rate: f64,
        /// Override for the hash count; autotuned from the error rate when
        /// absent.
        num_hashes: Option<usize>,
    },
    Xor {
        fingerprint_bits: u32,
    },
    BinaryFuse {
        fingerprint_bits: u32,
    },
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig::None
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnyFilter {
    Bloom(BloomFilter),
    Xor(XorFilter),
    BinaryFuse(BinaryFuseFilter),
}

const FILTER_TAG_BLOOM: u8 = 0;
const FILTER_TAG_XOR: u8 = 1;
const FILTER_TAG_BINARY_FUSE: u8 = 2;

impl AnyFilter {
    fn contains(&self, key: &[u8]) -> bool {
        match self {
            AnyFilter::Bloom(filter) => filter.contains(key),
            AnyFilter::Xor(filter) => filter.contains_hash(prehash_key(key)),
            AnyFilter::BinaryFuse(filter) => filter.contains_hash(prehash_key(key)),
        }
    }

    fn size_in_bytes(&self) -> usize {
        match self {
            AnyFilter::Bloom(filter) => filter.size_in_bytes(),
            AnyFilter::Xor(filter) => filter.size_in_bytes(),
            AnyFilter::BinaryFuse(filter) => filter.size_in_bytes(),
        }
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        match self {
            AnyFilter::Bloom(filter) => {
                serial::write_u8(writer, FILTER_TAG_BLOOM)?;
                filter.write_to(writer)
            }
            AnyFilter::Xor(filter) => {
                serial::write_u8(writer, FILTER_TAG_XOR)?;
                filter.write_to(writer)
            }
            AnyFilter::BinaryFuse(filter) => {
                serial::write_u8(writer, FILTER_TAG_BINARY_FUSE)?;
                filter.write_to(writer)
            }
        }
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        match serial::read_u8(reader)? {
            FILTER_TAG_BLOOM => Ok(AnyFilter::Bloom(BloomFilter::read_from(reader)?)),
            FILTER_TAG_XOR => Ok(AnyFilter::Xor(XorFilter::read_from(reader)?)),
            FILTER_TAG_BINARY_FUSE => {
                Ok(AnyFilter::BinaryFuse(BinaryFuseFilter::read_from(reader)?))
            }
            tag => Err(CsfError::Deserialization(format!(
                "unknown filter tag {tag}"
            ))),
        }
    }
}

/// A built filter together with the absorbed majority value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PreFilter<V> {
    filter: AnyFilter,
    most_common: V,
}

impl<V: Value> PreFilter<V> {
    /// *Maybe* for every key the filter was built over; *definitely not*
    /// answers mean the key's value is the absorbed one.
    #[inline]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.filter.contains(key)
    }

    #[inline]
    pub fn most_common(&self) -> &V {
        &self.most_common
    }

    pub fn size_in_bytes(&self) -> usize {
        self.filter.size_in_bytes()
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        self.filter.write_to(writer)?;
        self.most_common.write_value(writer)
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let filter = AnyFilter::read_from(reader)?;
        let most_common = V::read_value(reader)?;
        Ok(Self {
            filter,
            most_common,
        })
    }
}

#[inline]
pub(crate) fn prehash_key(key: &[u8]) -> u64 {
    xxh3_64_with_seed(key, KEY_HASH_SEED)
}

/// Most frequent value in the list and its count.
pub(crate) fn highest_frequency<V: Value>(values: &[V]) -> (usize, V) {
    let mut frequencies: HashMap<&V, usize> = HashMap::new();
    for value in values {
        *frequencies.entry(value).or_insert(0) += 1;
    }
    let (value, count) = frequencies
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .expect("non-empty value list");
    (count, value.clone())
}

/// Build the configured filter over the minority keys and drop every pair the
/// filter rules out. Returns the filter (if one was built) plus the retained
/// pairs; with no minority there is nothing to filter and the input passes
/// through untouched.
pub(crate) fn apply_prefilter<'a, V: Value>(
    config: &FilterConfig,
    keys: Vec<&'a [u8]>,
    values: Vec<V>,
) -> Result<(Option<PreFilter<V>>, Vec<&'a [u8]>, Vec<V>), CsfError> {
    if matches!(config, FilterConfig::None) {
        return Ok((None, keys, values));
    }

    let (highest, most_common) = highest_frequency(&values);
    let minority = values.len() - highest;
    if minority == 0 {
        debug!("pre-filter skipped: all {} values identical", values.len());
        return Ok((None, keys, values));
    }

    let minority_keys: Vec<&[u8]> = keys
        .iter()
        .zip(&values)
        .filter(|(_, value)| **value != most_common)
        .map(|(key, _)| *key)
        .collect();

    let filter = match *config {
        FilterConfig::None => unreachable!(),
        FilterConfig::Bloom {
            error_rate,
            num_hashes,
        } => {
            let mut bloom = match num_hashes {
                Some(k) => BloomFilter::autotuned_fixed_k(minority, error_rate, k)?,
                None => BloomFilter::autotuned(minority, error_rate)?,
            };
            for key in &minority_keys {
                bloom.add(key);
            }
            AnyFilter::Bloom(bloom)
        }
        FilterConfig::Xor { fingerprint_bits } => {
            let hashes: Vec<u64> = minority_keys.iter().map(|key| prehash_key(key)).collect();
            AnyFilter::Xor(XorFilter::build(&hashes, fingerprint_bits)?)
        }
        FilterConfig::BinaryFuse { fingerprint_bits } => {
            let hashes: Vec<u64> = minority_keys.iter().map(|key| prehash_key(key)).collect();
            AnyFilter::BinaryFuse(BinaryFuseFilter::build(&hashes, fingerprint_bits)?)
        }
    };

    // Keep exactly the pairs the filter answers *maybe* for: all minority
    // keys plus the majority false positives, which must stay in the
    // function with their true value.
    let mut kept_keys = Vec::with_capacity(minority);
    let mut kept_values = Vec::with_capacity(minority);
    for (key, value) in keys.into_iter().zip(values) {
        if filter.contains(key) {
            kept_keys.push(key);
            kept_values.push(value);
        }
    }
    debug!(
        "pre-filter kept {} of {} pairs ({} minority), {} bytes",
        kept_keys.len(),
        highest + minority,
        minority,
        filter.size_in_bytes()
    );

    Ok((
        Some(PreFilter {
            filter,
            most_common,
        }),
        kept_keys,
        kept_values,
    ))
}
