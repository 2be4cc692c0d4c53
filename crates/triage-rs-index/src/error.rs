//! Error types for embedding and index operations.

use thiserror::Error;

/// Errors returned by embedding providers and the similarity index.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    /// The embedding provider rejected the input or failed to produce a vector.
    #[error("embedding failed: {0}")]
    Embedding(String),
    /// A vector did not match the index dimension.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// The index could not serve the request.
    #[error("index unavailable: {0}")]
    Unavailable(String),
}
