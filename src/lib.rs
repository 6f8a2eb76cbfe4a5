//! compressed_static_function — immutable keyless maps (CSF).
//!
//! - Build once over a set of **unique** byte-string keys and their values.
//! - Queries return the stored value for every construction key and *some*
//!   value for anything else; no keys are stored, so space approaches the
//!   entropy of the value distribution.
//! - Per-bucket GF(2) systems solved by hypergraph peeling, lazy Gaussian
//!   elimination and a small dense solve; unlucky buckets retry with a fresh
//!   seed.
//! - Optional Bloom / XOR / binary fuse pre-filter absorbs the most common
//!   value so only the minority is encoded.

pub mod bits;
pub mod builder;
pub mod csf;
pub mod entropy;
mod error;
pub mod filter;
pub mod gauss;
pub mod hash;
pub mod huffman;
pub mod lazy;
pub mod multiset;
pub mod peel;
mod serial;
pub mod solve;
pub mod stats;
pub mod store;
pub mod system;
pub mod value;

pub use builder::{BuildConfig, Builder};
pub use csf::Csf;
pub use entropy::{entropy, entropy_permutation};
pub use error::CsfError;
pub use filter::FilterConfig;
pub use multiset::MultisetCsf;
pub use stats::CsfStats;
pub use value::Value;
