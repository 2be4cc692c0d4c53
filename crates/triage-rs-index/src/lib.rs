//! Embedding boundary and nearest-neighbour index over historical tickets.

mod cache;
mod embedding;
mod error;
mod index;
mod metric;

pub use cache::{CacheStats, EmbeddingCache};
pub use embedding::{EmbeddingProvider, HashedEmbedding, HttpEmbedding};
pub use error::IndexError;
pub use index::{CorpusBuild, SimilarityIndex};
pub use metric::{DistanceMetric, cosine_distance, cosine_similarity, euclidean_distance};
