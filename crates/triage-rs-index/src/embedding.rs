//! Embedding provider boundary plus the built-in providers.

use crate::IndexError;
use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

/// Converts text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text. Empty or whitespace-only input is rejected.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;
}

/// Reject input no provider can embed meaningfully.
fn ensure_embeddable(text: &str) -> Result<(), IndexError> {
    if text.trim().is_empty() {
        return Err(IndexError::Embedding("cannot embed empty text".to_string()));
    }
    Ok(())
}

/// Deterministic bag-of-words embedding using feature hashing.
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a) into buckets and the
/// resulting count vector is L2-normalized, so texts sharing words land close
/// under cosine distance. Requires no model download or network access.
#[derive(Debug, Clone)]
pub struct HashedEmbedding {
    dimension: usize,
}

impl HashedEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = FNV_OFFSET;
        for byte in token.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        (hash % self.dimension as u64) as usize
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        ensure_embeddable(text)?;
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;
        for token in text
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            vector[self.bucket(&token.to_lowercase())] += 1.0;
            tokens += 1;
        }
        if tokens == 0 {
            return Err(IndexError::Embedding(
                "text contains no alphanumeric tokens".to_string(),
            ));
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= norm;
        }
        Ok(vector)
    }
}

impl Default for HashedEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.embed_sync(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Maximum number of bytes from an HTTP error body kept in error messages.
const MAX_ERROR_BODY_LEN: usize = 200;

/// OpenAI-compatible `POST {base_url}/embeddings` client.
#[derive(Debug, Clone)]
pub struct HttpEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbedding {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimension,
        }
    }

    fn parse_vector(&self, body: &Value) -> Result<Vec<f32>, IndexError> {
        let values = body
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                IndexError::Embedding("response is missing data[0].embedding".to_string())
            })?;
        let vector = values
            .iter()
            .map(|value| {
                value.as_f64().map(|x| x as f32).ok_or_else(|| {
                    IndexError::Embedding("embedding contains a non-numeric value".to_string())
                })
            })
            .collect::<Result<Vec<f32>, IndexError>>()?;
        if vector.len() != self.dimension {
            return Err(IndexError::Embedding(format!(
                "provider returned a vector of length {}, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        ensure_embeddable(text)?;
        let url = format!("{}/embeddings", self.base_url);
        debug!(
            "requesting embedding (model={}, len={})",
            self.model,
            text.len()
        );
        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": text }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| IndexError::Embedding(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(unreadable body)".to_string());
            let body: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
            return Err(IndexError::Embedding(format!(
                "HTTP {}: {body}",
                status.as_u16()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| IndexError::Embedding(err.to_string()))?;
        self.parse_vector(&body)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosine_distance;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn hashed_embedding_is_deterministic_and_normalized() {
        let provider = HashedEmbedding::new(64);
        let first = provider.embed("Wifi keeps dropping").await.expect("embed");
        let second = provider.embed("wifi KEEPS dropping!").await.expect("embed");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        let norm: f32 = first.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_words_are_closer() {
        let provider = HashedEmbedding::default();
        let query = provider.embed("payment failed at checkout").await.expect("q");
        let near = provider.embed("payment failed on renewal").await.expect("near");
        let far = provider.embed("bluetooth pairing lost").await.expect("far");
        let near_distance = cosine_distance(&query, &near).expect("near distance");
        let far_distance = cosine_distance(&query, &far).expect("far distance");
        assert!(near_distance < far_distance);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let provider = HashedEmbedding::default();
        assert!(matches!(
            provider.embed("   ").await,
            Err(IndexError::Embedding(_))
        ));
        assert!(matches!(
            provider.embed("?!").await,
            Err(IndexError::Embedding(_))
        ));
    }

    #[test]
    fn http_response_shape_is_validated() {
        let provider = HttpEmbedding::new("http://localhost/v1/", "test", None, 3);
        let ok = json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] });
        assert_eq!(provider.parse_vector(&ok).expect("vector").len(), 3);

        let short = json!({ "data": [{ "embedding": [0.1] }] });
        assert_eq!(
            provider.parse_vector(&short).unwrap_err(),
            IndexError::Embedding(
                "provider returned a vector of length 1, expected 3".to_string()
            )
        );

        let missing = json!({ "object": "list" });
        assert!(matches!(
            provider.parse_vector(&missing),
            Err(IndexError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn http_embedding_rejects_empty_text_without_network() {
        let provider = HttpEmbedding::new("http://127.0.0.1:9", "test", None, 3);
        assert!(matches!(
            provider.embed("").await,
            Err(IndexError::Embedding(_))
        ));
    }
}
