use std::io::{Read, Write};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::debug;

use crate::bits::BitPackedArray;
use crate::error::CsfError;
use crate::hash::mix_seed;
use crate::serial;

const ARITY: usize = 4;
const MAX_HASH_INDEX: u64 = 10;
const SEED_BASE: u64 = 0x0C0F_FEE0_0D15_EA5E;

/// 4-wise binary fuse filter with bit-packed fingerprints (1–32 bits).
///
/// The table is carved into consecutive segments; each key owns one cell in
/// each of four adjacent segments and its fingerprint is the XOR of the four
/// cells. Construction stages keys in rough segment order, then runs the
/// count-and-XOR peel with packed count/slot bytes. The hasher seed is
/// derived from `hash_index`, so the persisted index reproduces it on load.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFuseFilter {
    num_keys: u64,
    array_length: usize,
    segment_count: usize,
    segment_count_length: usize,
    segment_length: usize,
    segment_length_mask: u64,
    fingerprints: BitPackedArray,
    hash_index: u64,
}

impl BinaryFuseFilter {
    pub fn build(key_hashes: &[u64], fingerprint_bits: u32) -> Result<Self, CsfError> {
        if !(1..=32).contains(&fingerprint_bits) {
            return Err(CsfError::FilterConstruction(format!(
                "fingerprint width {fingerprint_bits} outside [1, 32]"
            )));
        }
        if key_hashes.is_empty() {
            return Err(CsfError::FilterConstruction(
                "binary fuse filter over zero keys".to_string(),
            ));
        }

        let size = key_hashes.len();
        let segment_length = segment_length_for(size);
        let size_factor = size_factor_for(size);
        let capacity = (size as f64 * size_factor) as usize;
        let provisional = (capacity.div_ceil(segment_length)).saturating_sub(ARITY - 1).max(1);
        let mut array_length = (provisional + ARITY - 1) * segment_length;
        let segment_length_mask = segment_length as u64 - 1;
        let mut segment_count = array_length.div_ceil(segment_length);
        segment_count = if segment_count <= ARITY - 1 {
            1
        } else {
            segment_count - (ARITY - 1)
        };
        array_length = (segment_count + ARITY - 1) * segment_length;
        let segment_count_length = segment_count * segment_length;

        let mut reverse_order = vec![0u64; size + 1];
        let mut reverse_slot = vec![0u8; size];
        let mut t2count = vec![0u8; array_length];
        let mut t2hash = vec![0u64; array_length];
        let mut alone = vec![0usize; array_length];
        // Slot sequence wrapped around so slots found+1..found+3 are the
        // three cells other than the one being peeled.
        let slot_wrap: [u8; 7] = [0, 1, 2, 3, 0, 1, 2];

        let geometry = Geometry {
            segment_count_length,
            segment_length,
            segment_length_mask,
        };

        let mut hash_index = 0u64;
        let reverse_order_pos = loop {
            let seed = mix_seed(SEED_BASE, hash_index);
            t2count.fill(0);
            t2hash.fill(0);
            reverse_order.fill(0);
            reverse_order[size] = 1;

            // Stage keys into reverse_order in rough segment order; this
            // block sort makes the peel walk the table mostly sequentially.
            let mut block_bits = 1usize;
            while (1usize << block_bits) < segment_count {
                block_bits += 1;
            }
            let block = 1usize << block_bits;
            let mut start_pos: Vec<usize> = (0..block).map(|i| i * size / block).collect();
            for &key in key_hashes {
                let hash = mix(key, seed);
                let mut segment_index = (hash >> (64 - block_bits)) as usize;
                while reverse_order[start_pos[segment_index]] != 0 {
                    segment_index += 1;
                    segment_index &= block - 1;
                }
                reverse_order[start_pos[segment_index]] = hash;
                start_pos[segment_index] += 1;
            }

            // Count pass. The low 2 bits of each count byte accumulate the
            // XOR of slot numbers, the rest counts occupants; overflow past
            // 31 keys in a cell sets the high bit.
            let mut count_mask = 0u8;
            for i in 0..size {
                let hash = reverse_order[i];
                for slot in 0..ARITY {
                    let index = geometry.position(hash, slot);
                    t2count[index] = t2count[index].wrapping_add(4);
                    t2count[index] ^= slot as u8;
                    t2hash[index] ^= hash;
                    count_mask |= t2count[index];
                }
            }
            if count_mask >= 0x80 {
                return Err(CsfError::FilterConstruction(
                    "binary fuse cell overflow (likely duplicate key hashes)".to_string(),
                ));
            }

            let mut alone_pos = 0usize;
            for (i, &count) in t2count.iter().enumerate() {
                if count >> 2 == 1 {
                    alone[alone_pos] = i;
                    alone_pos += 1;
                }
            }

            let mut reverse_order_pos = 0usize;
            while alone_pos > 0 {
                alone_pos -= 1;
                let index = alone[alone_pos];
                if t2count[index] >> 2 != 1 {
                    continue;
                }
                let hash = t2hash[index];
                let found = (t2count[index] & 3) as usize;
                reverse_slot[reverse_order_pos] = found as u8;
                reverse_order[reverse_order_pos] = hash;

                let mut cells = [0usize; 7];
                cells[1] = geometry.position(hash, 1);
                cells[2] = geometry.position(hash, 2);
                cells[3] = geometry.position(hash, 3);
                cells[4] = geometry.position(hash, 0);
                cells[5] = cells[1];
                cells[6] = cells[2];

                for step in 1..=3 {
                    let other = cells[found + step];
                    alone[alone_pos] = other;
                    alone_pos += usize::from(t2count[other] >> 2 == 2);
                    t2count[other] = t2count[other].wrapping_sub(4);
                    t2count[other] ^= slot_wrap[found + step];
                    t2hash[other] ^= hash;
                }
                reverse_order_pos += 1;
            }

            if reverse_order_pos == size {
                break reverse_order_pos;
            }
            debug!(
                "binary fuse peel stalled at {reverse_order_pos}/{size}, hash index {hash_index}"
            );
            hash_index += 1;
            if hash_index > MAX_HASH_INDEX {
                return Err(CsfError::FilterConstruction(format!(
                    "binary fuse peel failed after {MAX_HASH_INDEX} reseeds"
                )));
            }
        };

        let mut fingerprints = BitPackedArray::new(array_length, fingerprint_bits);
        let mask = fingerprint_mask(fingerprint_bits);
        for i in (0..reverse_order_pos).rev() {
            let hash = reverse_order[i];
            let found = reverse_slot[i] as usize;
            let mut fp = fingerprint(hash, mask);

            let mut cells = [0usize; 7];
            cells[0] = geometry.position(hash, 0);
            cells[1] = geometry.position(hash, 1);
            cells[2] = geometry.position(hash, 2);
            cells[3] = geometry.position(hash, 3);
            cells[4] = cells[0];
            cells[5] = cells[1];
            cells[6] = cells[2];

            fp ^= fingerprints.get(cells[found + 1]);
            fp ^= fingerprints.get(cells[found + 2]);
            fp ^= fingerprints.get(cells[found + 3]);
            fingerprints.set(cells[found], fp);
        }

        Ok(Self {
            num_keys: size as u64,
            array_length,
            segment_count,
            segment_count_length,
            segment_length,
            segment_length_mask,
            fingerprints,
            hash_index,
        })
    }

    pub fn contains_hash(&self, key_hash: u64) -> bool {
        let seed = mix_seed(SEED_BASE, self.hash_index);
        let hash = mix(key_hash, seed);
        let geometry = Geometry {
            segment_count_length: self.segment_count_length,
            segment_length: self.segment_length,
            segment_length_mask: self.segment_length_mask,
        };
        let mask = fingerprint_mask(self.fingerprints.bits_per_element());
        let mut fp = fingerprint(hash, mask);
        for slot in 0..ARITY {
            fp ^= self.fingerprints.get(geometry.position(hash, slot));
        }
        fp == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.fingerprints.size_in_bytes()
    }

    pub(crate) fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), CsfError> {
        serial::write_u64(writer, self.num_keys)?;
        serial::write_u64(writer, self.array_length as u64)?;
        serial::write_u64(writer, self.segment_count as u64)?;
        serial::write_u64(writer, self.segment_count_length as u64)?;
        serial::write_u64(writer, self.segment_length as u64)?;
        serial::write_u64(writer, self.segment_length_mask)?;
        serial::write_u8(writer, self.fingerprints.bits_per_element() as u8)?;
        serial::write_u64(writer, self.fingerprints.words().len() as u64)?;
        serial::write_words(writer, self.fingerprints.words())?;
        serial::write_u64(writer, self.hash_index)
    }

    pub(crate) fn read_from<R: Read>(reader: &mut R) -> Result<Self, CsfError> {
        let num_keys = serial::read_u64(reader)?;
        let array_length = serial::read_u64(reader)? as usize;
        let segment_count = serial::read_u64(reader)? as usize;
        let segment_count_length = serial::read_u64(reader)? as usize;
        let segment_length = serial::read_u64(reader)? as usize;
        let segment_length_mask = serial::read_u64(reader)?;
        let fingerprint_bits = serial::read_u8(reader)? as u32;
        let num_words = serial::read_u64(reader)? as usize;
        let words = serial::read_words(reader, num_words)?;
        let fingerprints = BitPackedArray::from_words(words, array_length, fingerprint_bits)?;
        let hash_index = serial::read_u64(reader)?;
        Ok(Self {
            num_keys,
            array_length,
            segment_count,
            segment_count_length,
            segment_length,
            segment_length_mask,
            fingerprints,
            hash_index,
        })
    }
}

struct Geometry {
    segment_count_length: usize,
    segment_length: usize,
    segment_length_mask: u64,
}

impl Geometry {
    /// Cell for one of the four slots: multiply-high reduce into the segment
    /// span, offset by the slot's segment, then jitter within the segment
    /// from a 16-bit window of the hash.
    #[inline]
    fn position(&self, hash: u64, slot: usize) -> usize {
        let mut h = ((hash as u128 * self.segment_count_length as u128) >> 64) as u64;
        h += (slot * self.segment_length) as u64;
        if slot > 0 {
            h ^= (hash >> ((slot - 1) * 16)) & self.segment_length_mask;
        }
        h as usize
    }
}

/// Segment length `2^floor(ln n / ln 2.91 - 0.5)`, clamped to `[1, 2^18]`.
fn segment_length_for(size: usize) -> usize {
    let size = size.max(2) as f64;
    let exponent = (size.ln() / 2.91f64.ln() - 0.5).floor().clamp(0.0, 18.0);
    1usize << exponent as u32
}

/// Size factor `max(1.075, 0.77 + 0.305 ln(6e5) / ln n)`.
fn size_factor_for(size: usize) -> f64 {
    let size = size.max(2) as f64;
    (0.77 + 0.305 * 600_000f64.ln() / size.ln()).max(1.075)
}

#[inline]
fn fingerprint_mask(fingerprint_bits: u32) -> u64 {
    (1u64 << fingerprint_bits) - 1
}

#[inline]
fn fingerprint(hash: u64, mask: u64) -> u64 {
    (hash ^ (hash >> 32)) & mask
}

/// Murmur-style 64-bit finalizer over the seeded key hash.
#[inline]
fn mix(key_hash: u64, seed: u64) -> u64 {
    let mut h = key_hash.wrapping_add(seed);
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51afd7ed558ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
    h ^= h >> 33;
    h
}
