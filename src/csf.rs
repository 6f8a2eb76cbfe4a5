use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::BitArray;
use crate::error::CsfError;
use crate::filter::PreFilter;
use crate::hash::{Signature, start_positions};
use crate::huffman::decode_symbol;
use crate::serial;
use crate::value::Value;

/// An immutable compressed static function.
///
/// Stores no keys: per bucket, only the solved bit vector and the seed it was
/// solved under, plus the canonical code tables and (optionally) a pre-filter
/// with its absorbed value. Queries return *some* value for any input and
/// the correct value for every key the function was built over.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Csf<V> {
    solutions: Vec<(BitArray, u64)>,
    code_length_counts: Vec<u32>,
    ordered_symbols: Vec<V>,
    hash_store_seed: u64,
    prefilter: Option<PreFilter<V>>,
}

impl<V: Value> Csf<V> {
    pub(crate) fn new(
        solutions: Vec<(BitArray, u64)>,
        code_length_counts: Vec<u32>,
        ordered_symbols: Vec<V>,
        hash_store_seed: u64,
        prefilter: Option<PreFilter<V>>,
    ) -> Self {
        Self {
            solutions,
            code_length_counts,
            ordered_symbols,
            hash_store_seed,
            prefilter,
        }
    }

    /// Look up a key. Exact for every key of the construction set; arbitrary
    /// (but never failing) for anything else, unless the pre-filter rules the
    /// key out and the absorbed value is returned.
    pub fn query(&self, key: &[u8]) -> V {
        if let Some(prefilter) = &self.prefilter {
            if !prefilter.contains(key) {
                return prefilter.most_common().clone();
            }
        }

        let signature = Signature::from_key(key, self.hash_store_seed);
        let (solution, bucket_seed) = &self.solutions[signature.bucket(self.solutions.len())];
        let num_variables = solution.num_bits();
        let max_code_length = self.code_length_counts.len() - 1;

        let mut encoded = 0u64;
        for position in start_positions(signature, *bucket_seed, num_variables) {
            encoded ^= circular_window(solution, position, max_code_length);
        }
        decode_symbol(encoded, &self.code_length_counts, &self.ordered_symbols).clone()
    }

    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.solutions.len()
    }

    #[inline]
    pub fn prefilter(&self) -> Option<&PreFilter<V>> {
        self.prefilter.as_ref()
    }

    #[inline]
    pub fn max_code_length(&self) -> u32 {
        self.code_length_counts.len() as u32 - 1
    }

    #[inline]
    pub fn num_symbols(&self) -> usize {
        self.ordered_symbols.len()
    }

    pub(crate) fn solution_bit_lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.solutions.iter().map(|(solution, _)| solution.num_bits())
    }

    /// Artifact footprint: solution bits plus the pre-filter.
    pub fn size_in_bytes(&self) -> usize {
        let solution_bytes: usize = self
            .solutions
            .iter()
            .map(|(solution, _)| solution.num_bits().div_ceil(8) + 8)
            .sum();
        let filter_bytes = self
            .prefilter
            .as_ref()
            .map_or(0, PreFilter::size_in_bytes);
        solution_bytes + filter_bytes
    }

    /// Persist as `u32 type_id` followed by the payload.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u32(writer, V::TYPE_ID)?;
        self.write_payload(writer)
    }

    /// Load and verify the artifact was saved for this value type.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let type_id = serial::read_u32(reader)?;
        if type_id != V::TYPE_ID {
            return Err(CsfError::Deserialization(format!(
                "expected type id {} but found {type_id}",
                V::TYPE_ID
            )));
        }
        Self::read_payload(reader)
    }

    pub(crate) fn write_payload<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u32(writer, self.solutions.len() as u32)?;
        for (solution, bucket_seed) in &self.solutions {
            serial::write_u32(writer, solution.num_bits() as u32)?;
            serial::write_bytes(writer, &solution.to_le_bytes())?;
            serial::write_u64(writer, *bucket_seed)?;
        }

        serial::write_u32(writer, self.code_length_counts.len() as u32)?;
        for &count in &self.code_length_counts {
            serial::write_u32(writer, count)?;
        }
        serial::write_u32(writer, self.ordered_symbols.len() as u32)?;
        for symbol in &self.ordered_symbols {
            symbol.write_value(writer)?;
        }
        serial::write_u64(writer, self.hash_store_seed)?;

        match &self.prefilter {
            Some(prefilter) => {
                serial::write_u8(writer, 1)?;
                prefilter.write_to(writer)
            }
            None => serial::write_u8(writer, 0),
        }
    }

    pub(crate) fn read_payload<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let num_buckets = serial::read_u32(reader)? as usize;
        if num_buckets == 0 {
            return Err(CsfError::Deserialization(
                "artifact has zero buckets".to_string(),
            ));
        }
        let mut solutions = Vec::with_capacity(num_buckets);
        for _ in 0..num_buckets {
            let num_bits = serial::read_u32(reader)? as usize;
            let bytes = serial::read_vec(reader, num_bits.div_ceil(8))?;
            let solution = BitArray::from_le_bytes(&bytes, num_bits)?;
            let bucket_seed = serial::read_u64(reader)?;
            solutions.push((solution, bucket_seed));
        }

        let n_lengths = serial::read_u32(reader)? as usize;
        let mut code_length_counts = Vec::with_capacity(n_lengths);
        for _ in 0..n_lengths {
            code_length_counts.push(serial::read_u32(reader)?);
        }
        if code_length_counts.len() < 2
            || code_length_counts.len() > crate::huffman::MAX_CODE_LENGTH as usize + 1
            || code_length_counts[0] != 0
        {
            return Err(CsfError::Deserialization(
                "malformed code length counts".to_string(),
            ));
        }
        let n_symbols = serial::read_u32(reader)? as usize;
        let mut ordered_symbols = Vec::with_capacity(n_symbols);
        for _ in 0..n_symbols {
            ordered_symbols.push(V::read_value(reader)?);
        }
        if ordered_symbols.is_empty() {
            return Err(CsfError::Deserialization(
                "artifact has no symbols".to_string(),
            ));
        }
        let hash_store_seed = serial::read_u64(reader)?;

        let prefilter = match serial::read_u8(reader)? {
            0 => None,
            1 => Some(PreFilter::read_from(reader)?),
            tag => {
                return Err(CsfError::Deserialization(format!(
                    "invalid filter presence byte {tag}"
                )));
            }
        };

        Ok(Self {
            solutions,
            code_length_counts,
            ordered_symbols,
            hash_store_seed,
            prefilter,
        })
    }

    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>, CsfError>
    where
        V: serde::Serialize,
    {
        Ok(bincode::serialize(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CsfError>
    where
        V: serde::de::DeserializeOwned,
    {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Read `len` bits starting at `start`, wrapping circularly at the end of
/// the solution vector, most significant bit first.
fn circular_window(solution: &BitArray, start: usize, len: usize) -> u64 {
    let num_bits = solution.num_bits();
    if start + len <= num_bits {
        return solution.get_u64(start, start + len);
    }
    // Wrapping reads are rare (and may wrap more than once when a small
    // bucket meets a long global code), so bit-at-a-time is fine here.
    let mut out = 0u64;
    let mut index = start;
    for _ in 0..len {
        out = (out << 1) | solution.get(index) as u64;
        index += 1;
        if index == num_bits {
            index = 0;
        }
    }
    out
}
