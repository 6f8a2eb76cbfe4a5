use hashbrown::HashMap;

use crate::bits::BitArray;
use crate::error::CsfError;

/// Hard cap on codeword length; the query fast path packs an encoded value
/// into a single `u64`.
pub const MAX_CODE_LENGTH: u32 = 64;

/// A canonical codeword: the code value right-aligned in `bits`, `len` bits
/// wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Codeword {
    pub bits: u64,
    pub len: u32,
}

/// Minimum-redundancy codeword lengths, computed in place over a frequency
/// array sorted in non-decreasing order (Moffat–Katajainen). On return,
/// `a[i]` holds the codeword length of the symbol whose frequency was `a[i]`.
///
/// A one-symbol alphabet gets length 1: a zero-length codeword would make the
/// decoder's walk vacuous and a query could never consume a bit.
pub fn min_redundancy_lengths(a: &mut [u32]) {
    let n = a.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        a[0] = 1;
        return;
    }

    // First pass, left to right: pair roots and leaves, storing parent
    // pointers into the array.
    a[0] += a[1];
    let mut root = 0usize;
    let mut leaf = 2usize;
    for next in 1..n - 1 {
        if leaf >= n || a[root] < a[leaf] {
            a[next] = a[root];
            a[root] = next as u32;
            root += 1;
        } else {
            a[next] = a[leaf];
            leaf += 1;
        }
        if leaf >= n || (root < next && a[root] < a[leaf]) {
            a[next] += a[root];
            a[root] = next as u32;
            root += 1;
        } else {
            a[next] += a[leaf];
            leaf += 1;
        }
    }

    // Second pass, right to left: parent pointers become internal depths.
    a[n - 2] = 0;
    for next in (0..n.saturating_sub(2)).rev() {
        a[next] = a[a[next] as usize] + 1;
    }

    // Third pass, right to left: fill leaf depths from the depth counts.
    let mut avbl = 1i64;
    let mut used = 0i64;
    let mut depth = 0u32;
    let mut root = n as i64 - 2;
    let mut next = n as i64 - 1;
    while avbl > 0 {
        while root >= 0 && a[root as usize] == depth {
            used += 1;
            root -= 1;
        }
        while avbl > used {
            a[next as usize] = depth;
            next -= 1;
            avbl -= 1;
        }
        avbl = 2 * used;
        depth += 1;
        used = 0;
    }
}

/// Canonical Huffman code over a value multiset.
///
/// `code_length_counts[l]` is the number of codewords of length `l` and
/// `ordered_symbols` lists symbols in canonical code order; together they are
/// all a decoder needs. The encode dictionary only exists during
/// construction and is not part of the artifact.
pub struct HuffmanTable<V> {
    pub code_length_counts: Vec<u32>,
    pub ordered_symbols: Vec<V>,
    codedict: HashMap<V, Codeword>,
}

impl<V> HuffmanTable<V>
where
    V: Clone + Eq + Ord + core::hash::Hash,
{
    pub fn from_values(values: &[V]) -> Result<Self, CsfError> {
        if values.is_empty() {
            return Err(CsfError::ShapeMismatch(
                "cannot build a code over zero values".to_string(),
            ));
        }

        let mut frequencies: HashMap<V, u32> = HashMap::new();
        for value in values {
            *frequencies.entry(value.clone()).or_insert(0) += 1;
        }

        // Sort by frequency ascending; ties by symbol descending so that the
        // reversal below leaves equal-frequency symbols in symbol order.
        let mut pairs: Vec<(V, u32)> = frequencies.into_iter().collect();
        pairs.sort_unstable_by(|x, y| x.1.cmp(&y.1).then_with(|| y.0.cmp(&x.0)));

        let mut lengths: Vec<u32> = pairs.iter().map(|(_, freq)| *freq).collect();
        min_redundancy_lengths(&mut lengths);

        // Code assignment runs in non-decreasing length order, which is the
        // reverse of the frequency order used above.
        pairs.reverse();
        lengths.reverse();

        let max_code_length = *lengths.last().unwrap_or(&1);
        if max_code_length > MAX_CODE_LENGTH {
            return Err(CsfError::ShapeMismatch(format!(
                "codeword length {max_code_length} exceeds the {MAX_CODE_LENGTH}-bit cap"
            )));
        }

        let mut code_length_counts = vec![0u32; max_code_length as usize + 1];
        let mut codedict = HashMap::with_capacity(pairs.len());
        let mut code = 0u64;
        for i in 0..pairs.len() {
            let len = lengths[i];
            codedict.insert(pairs[i].0.clone(), Codeword { bits: code, len });
            code_length_counts[len as usize] += 1;
            if i + 1 < lengths.len() {
                code += 1;
                code <<= lengths[i + 1] - len;
            }
        }

        let ordered_symbols = pairs.into_iter().map(|(symbol, _)| symbol).collect();

        Ok(Self {
            code_length_counts,
            ordered_symbols,
            codedict,
        })
    }

    /// Codeword of a value seen during construction.
    #[inline]
    pub fn codeword(&self, value: &V) -> Codeword {
        self.codedict[value]
    }

    #[inline]
    pub fn max_code_length(&self) -> u32 {
        self.code_length_counts.len() as u32 - 1
    }

    #[inline]
    pub fn decode(&self, encoded: u64) -> &V {
        decode_symbol(encoded, &self.code_length_counts, &self.ordered_symbols)
    }
}

/// Decode the first symbol from `encoded`, a right-aligned integer of width
/// `code_length_counts.len() - 1` whose most significant bits hold the code.
///
/// Walks lengths upward, tracking the first code and the symbol index of each
/// length class, so only the two canonical arrays are needed.
pub fn decode_symbol<'a, V>(encoded: u64, code_length_counts: &[u32], symbols: &'a [V]) -> &'a V {
    let max_len = code_length_counts.len() - 1;
    let mut code: i128 = 0;
    let mut first: i128 = 0;
    let mut index: i128 = 0;
    for i in 1..=max_len {
        let next_bit = ((encoded >> (max_len - i)) & 1) as i128;
        code |= next_bit;
        let count = code_length_counts[i] as i128;
        if code - count < first {
            return &symbols[(index + code - first) as usize];
        }
        index += count;
        first = (first + count) << 1;
        code <<= 1;
    }
    // A complete canonical code always decodes above; only the one-symbol
    // alphabet leaves half the bit space unassigned, so clamp.
    &symbols[symbols.len() - 1]
}

/// Decode the first symbol from a bit vector (bit 0 first).
pub fn decode_symbol_bits<'a, V>(
    encoded: &BitArray,
    code_length_counts: &[u32],
    symbols: &'a [V],
) -> &'a V {
    let max_len = code_length_counts.len() - 1;
    let width = max_len.min(encoded.num_bits());
    let aligned = encoded.get_u64(0, width) << (max_len - width);
    decode_symbol(aligned, code_length_counts, symbols)
}
