use std::path::PathBuf;

use thiserror::Error;

/// An error raised while hashing frames, building or loading an index, or searching.
#[derive(Error, Debug)]
pub enum Error {
    /// A frame could not be hashed (e.g. it has no pixels).
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// A vector was supplied whose length differs from the index dimensionality.
    #[error("Dimension mismatch: index has {expected} dimensions, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An index built from one hasher's fingerprints was offered for another hasher.
    #[error("Hasher mismatch: index was built from {actual} fingerprints, expected {expected}")]
    HasherMismatch { expected: String, actual: String },

    /// A search was requested for a hasher whose index was never built or loaded.
    #[error("No index has been built or loaded for hasher {0}")]
    IndexNotReady(String),

    /// The index lookup table does not agree with the fingerprints it was built from.
    #[error("Index lookup table is inconsistent: {0}")]
    InconsistentLookup(String),

    #[error("Error accessing fingerprint file {path}: {src}")]
    FingerprintFileIo { src: std::io::Error, path: PathBuf },

    #[error("Error accessing index file {path}: {src}")]
    IndexFileIo { src: std::io::Error, path: PathBuf },

    #[error("Failed to serialize {path}: {src}")]
    Serialization { src: String, path: PathBuf },

    #[error("Failed to deserialize {path}: {src}")]
    Deserialization { src: String, path: PathBuf },

    #[error("Failed to start worker threads: {0}")]
    ThreadPool(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown hasher: {0}")]
    UnknownHasher(String),
}
