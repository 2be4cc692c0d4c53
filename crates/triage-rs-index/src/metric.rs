//! Similarity and distance metrics for embeddings.
//!
//! Accumulation happens in `f64` so that rankings do not flip on rounding
//! noise between otherwise equal candidates.

use crate::IndexError;

/// Distance function used to rank stored tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    /// L2 distance.
    Euclidean,
}

impl DistanceMetric {
    /// Distance between two vectors under this metric.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f64, IndexError> {
        match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }
}

fn ensure_same_dimension(a: &[f32], b: &[f32]) -> Result<(), IndexError> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Cosine similarity in `[-1, 1]`; zero-magnitude vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, IndexError> {
    ensure_same_dimension(a, b)?;
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Cosine distance (`1 - similarity`), in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64, IndexError> {
    Ok((1.0 - cosine_similarity(a, b)?).clamp(0.0, 2.0))
}

/// Euclidean (L2) distance, always `>= 0`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f64, IndexError> {
    ensure_same_dimension(a, b)?;
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
        .sum();
    Ok(sum.sqrt())
}
