use hashbrown::HashSet;
use log::debug;

use crate::error::CsfError;
use crate::hash::Signature;

/// How many hash-store seeds to try before declaring the key set degenerate.
const SEED_ATTEMPTS: u64 = 3;

/// Keys and values partitioned into roughly equal-size buckets by the top
/// bits of each key's 128-bit signature. Buckets are independent
/// subproblems: each one gets its own linear system and its own solution.
pub struct BucketedHashStore<V> {
    pub key_buckets: Vec<Vec<Signature>>,
    pub value_buckets: Vec<Vec<V>>,
    pub seed: u64,
}

impl<V> BucketedHashStore<V> {
    #[inline]
    pub fn num_buckets(&self) -> usize {
        self.key_buckets.len()
    }
}

/// Route every (key, value) pair to its bucket. Two keys landing on the same
/// 128-bit signature is treated as a duplicate key: the seed is retried a few
/// times in case it was a genuine (astronomically unlikely) collision, then
/// surfaced as [`CsfError::DuplicateKey`].
pub fn partition_to_buckets<K, V>(
    keys: &[K],
    values: &[V],
    bucket_size: usize,
) -> Result<BucketedHashStore<V>, CsfError>
where
    K: AsRef<[u8]>,
    V: Clone,
{
    if keys.len() != values.len() {
        return Err(CsfError::ShapeMismatch(format!(
            "{} keys but {} values",
            keys.len(),
            values.len()
        )));
    }
    let num_buckets = 1 + keys.len() / bucket_size;

    'seeds: for seed in 0..SEED_ATTEMPTS {
        let mut key_buckets: Vec<Vec<Signature>> = vec![Vec::new(); num_buckets];
        let mut value_buckets: Vec<Vec<V>> = vec![Vec::new(); num_buckets];
        let mut seen: Vec<HashSet<(u64, u64)>> = vec![HashSet::new(); num_buckets];

        for (key, value) in keys.iter().zip(values) {
            let signature = Signature::from_key(key.as_ref(), seed);
            let bucket = signature.bucket(num_buckets);
            if !seen[bucket].insert((signature.high, signature.low)) {
                debug!("signature collision under seed {seed}, retrying");
                continue 'seeds;
            }
            key_buckets[bucket].push(signature);
            value_buckets[bucket].push(value.clone());
        }

        return Ok(BucketedHashStore {
            key_buckets,
            value_buckets,
            seed,
        });
    }

    Err(CsfError::DuplicateKey)
}
