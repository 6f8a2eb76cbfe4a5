use thiserror::Error;

/// Errors surfaced by construction, querying helpers and (de)serialization.
///
/// Retries are handled inside the component that can meaningfully retry
/// (hash-store seed, bucket seed, filter seed); anything that escapes a retry
/// budget is fatal for the current operation and no partial artifact is
/// produced.
#[derive(Debug, Error)]
pub enum CsfError {
    #[error("duplicate key detected during construction")]
    DuplicateKey,

    #[error("system not solvable: {0}")]
    Unsolvable(String),

    #[error("filter construction failed: {0}")]
    FilterConstruction(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serde(#[from] Box<bincode::ErrorKind>),
}
