use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;

use crate::bits::BitPackedArray;
use crate::error::CsfError;
use crate::serial;

/// Reseed budget for the peel-and-assign construction.
const MAX_HASH_INDEX: u64 = 10;

/// 3-wise XOR filter with bit-packed fingerprints (1–32 bits).
///
/// The table is split into three equal blocks; each key owns one cell per
/// block and its b-bit fingerprint equals the XOR of the three cells. Keys
/// are pre-hashed to 64 bits before they reach the filter.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorFilter {
    num_keys: u64,
    array_length: usize,
    block_length: usize,
    fingerprints: BitPackedArray,
    hash_index: u64,
}

impl XorFilter {
    /// Build over pre-hashed keys, retrying the position derivation with
    /// fresh hash indices until the peel succeeds.
    pub fn build(key_hashes: &[u64], fingerprint_bits: u32) -> Result<Self, CsfError> {
        if !(1..=32).contains(&fingerprint_bits) {
            return Err(CsfError::FilterConstruction(format!(
                "fingerprint width {fingerprint_bits} outside [1, 32]"
            )));
        }
        if key_hashes.is_empty() {
            return Err(CsfError::FilterConstruction(
                "xor filter over zero keys".to_string(),
            ));
        }

        let num_keys = key_hashes.len();
        let array_length = 32 + (1.23 * num_keys as f64) as usize;
        let block_length = array_length / 3;

        for hash_index in 0..MAX_HASH_INDEX {
            let mut t2count = vec![0u32; array_length];
            let mut t2hash = vec![0u64; array_length];
            for &hash in key_hashes {
                for hi in 0..3 {
                    let p = position(hash, hi, hash_index, block_length);
                    t2count[p] += 1;
                    t2hash[p] ^= hash;
                }
            }

            let mut alone: Vec<usize> =
                (0..array_length).filter(|&i| t2count[i] == 1).collect();
            let mut reverse_order: Vec<u64> = Vec::with_capacity(num_keys);
            let mut reverse_slot: Vec<u8> = Vec::with_capacity(num_keys);

            while let Some(cell) = alone.pop() {
                if t2count[cell] == 0 {
                    continue;
                }
                // Exactly one key left here; its hash is the XOR residue.
                let hash = t2hash[cell];
                let mut found = 0u8;
                for hi in 0..3 {
                    let p = position(hash, hi, hash_index, block_length);
                    t2count[p] -= 1;
                    if p == cell {
                        found = hi as u8;
                    } else {
                        t2hash[p] ^= hash;
                        if t2count[p] == 1 {
                            alone.push(p);
                        }
                    }
                }
                reverse_order.push(hash);
                reverse_slot.push(found);
            }

            if reverse_order.len() != num_keys {
                debug!(
                    "xor filter peel stalled at {}/{num_keys}, hash index {hash_index}",
                    reverse_order.len()
                );
                continue;
            }

            // Back-assign fingerprints so each key's three cells XOR to its
            // fingerprint.
            let mut fingerprints = BitPackedArray::new(array_length, fingerprint_bits);
            let mask = fingerprint_mask(fingerprint_bits);
            for (&hash, &found) in reverse_order.iter().zip(&reverse_slot).rev() {
                let mut fp = fingerprint(hash, mask);
                for hi in 0..3 {
                    if hi != found as usize {
                        fp ^= fingerprints.get(position(hash, hi, hash_index, block_length));
                    }
                }
                let home = position(hash, found as usize, hash_index, block_length);
                fingerprints.set(home, fp);
            }

            return Ok(Self {
                num_keys: num_keys as u64,
                array_length,
                block_length,
                fingerprints,
                hash_index,
            });
        }

        Err(CsfError::FilterConstruction(format!(
            "xor filter peel failed after {MAX_HASH_INDEX} hash indices"
        )))
    }

    /// *Maybe* iff the XOR of the three cells reproduces the fingerprint.
    pub fn contains_hash(&self, key_hash: u64) -> bool {
        let mask = fingerprint_mask(self.fingerprints.bits_per_element());
        let mut fp = fingerprint(key_hash, mask);
        for hi in 0..3 {
            fp ^= self
                .fingerprints
                .get(position(key_hash, hi, self.hash_index, self.block_length));
        }
        fp == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.fingerprints.size_in_bytes()
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u64(writer, self.num_keys)?;
        serial::write_u64(writer, self.array_length as u64)?;
        serial::write_u64(writer, self.block_length as u64)?;
        serial::write_u8(writer, self.fingerprints.bits_per_element() as u8)?;
        serial::write_u64(writer, self.fingerprints.words().len() as u64)?;
        serial::write_words(writer, self.fingerprints.words())?;
        serial::write_u64(writer, self.hash_index)
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let num_keys = serial::read_u64(reader)?;
        let array_length = serial::read_u64(reader)? as usize;
        let block_length = serial::read_u64(reader)? as usize;
        let fingerprint_bits = serial::read_u8(reader)? as u32;
        let num_words = serial::read_u64(reader)? as usize;
        let words = serial::read_words(reader, num_words)?;
        let fingerprints = BitPackedArray::from_words(words, array_length, fingerprint_bits)?;
        let hash_index = serial::read_u64(reader)?;
        Ok(Self {
            num_keys,
            array_length,
            block_length,
            fingerprints,
            hash_index,
        })
    }
}

#[inline]
fn fingerprint_mask(fingerprint_bits: u32) -> u64 {
    if fingerprint_bits == 64 {
        u64::MAX
    } else {
        (1u64 << fingerprint_bits) - 1
    }
}

#[inline]
fn fingerprint(hash: u64, mask: u64) -> u64 {
    (hash ^ (hash >> 32)) & mask
}

/// Cell index for one of the three blocks: rotate the hash by a per-block,
/// per-hash-index amount and multiply-high reduce into the block.
#[inline]
fn position(hash: u64, index: usize, hash_index: u64, block_length: usize) -> usize {
    let rotated = hash.rotate_left(((index as u64 * 21 + hash_index * 7) & 63) as u32);
    let reduced = ((rotated as u32 as u64 * block_length as u64) >> 32) as usize;
    reduced + index * block_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::splitmix64;

    fn hashes(count: usize, tag: u64) -> Vec<u64> {
        (0..count as u64).map(|i| splitmix64(i ^ (tag << 40))).collect()
    }

    #[test]
    fn no_false_negatives() {
        let keys = hashes(5000, 1);
        let filter = XorFilter::build(&keys, 8).unwrap();
        for &key in &keys {
            assert!(filter.contains_hash(key));
        }
    }

    #[test]
    fn false_positive_rate_is_bounded() {
        let keys = hashes(10_000, 2);
        let filter = XorFilter::build(&keys, 8).unwrap();
        let false_positives = hashes(10_000, 3)
            .iter()
            .filter(|&&key| filter.contains_hash(key))
            .count();
        // 2^-8 theoretical, 1.5x slack: 10_000 / 256 * 1.5 ≈ 59.
        assert!(false_positives <= 59, "{false_positives} false positives");
    }

    #[test]
    fn narrow_fingerprints_work() {
        let keys = hashes(2000, 4);
        let filter = XorFilter::build(&keys, 3).unwrap();
        for &key in &keys {
            assert!(filter.contains_hash(key));
        }
    }

    #[test]
    fn serialization_round_trip() {
        let keys = hashes(1000, 5);
        let filter = XorFilter::build(&keys, 13).unwrap();
        let mut buf = Vec::new();
        filter.write_to(&mut buf).unwrap();
        let restored = XorFilter::read_from(&mut std::io::Cursor::new(buf)).unwrap();
        assert_eq!(restored, filter);
    }
}
