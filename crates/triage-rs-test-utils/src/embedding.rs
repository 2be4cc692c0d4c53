use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use triage_rs_index::{EmbeddingProvider, IndexError};

/// Embedding provider backed by an explicit text-to-vector table.
///
/// Texts are looked up after trimming. Unknown or blank texts fail with
/// `IndexError::Embedding`, which lets tests exercise skip paths.
#[derive(Debug, Clone)]
pub struct TableEmbedding {
    dimension: usize,
    table: Arc<RwLock<HashMap<String, Vec<f32>>>>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl TableEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn with(self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.insert(text, vector);
        self
    }

    /// Sleep for `delay` before every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, text: impl Into<String>, vector: Vec<f32>) {
        let text = text.into();
        self.table.write().insert(text.trim().to_string(), vector);
    }

    /// Number of `embed` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(IndexError::Embedding("text is empty".to_string()));
        }
        self.table
            .read()
            .get(text)
            .cloned()
            .ok_or_else(|| IndexError::Embedding(format!("no vector for text: {text}")))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
