//! In-memory nearest-neighbour index over historical tickets.
//!
//! Reads take a shared lock on the current corpus. Mutations are serialized
//! by an async write lock; a full reload embeds into a fresh corpus off-lock
//! and swaps it in at the end, so a query observes either the old or the new
//! corpus and never a partial rebuild.

use crate::{CacheStats, DistanceMetric, EmbeddingCache, EmbeddingProvider, IndexError};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use triage_rs_protocol::{HistoricalTicket, SimilarityMatch, TicketId};

/// Outcome of rebuilding the corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusBuild {
    /// Tickets now served by the index.
    pub indexed: usize,
    /// Tickets left out because embedding or insertion failed.
    pub failures: Vec<(TicketId, IndexError)>,
}

/// Tickets in insertion order plus their cached embeddings.
#[derive(Debug, Default)]
struct Corpus {
    tickets: Vec<HistoricalTicket>,
    positions: HashMap<TicketId, usize>,
    cache: EmbeddingCache,
    dimension: Option<usize>,
}

impl Corpus {
    /// Store or replace a ticket. Replacements keep their original position.
    fn insert(&mut self, ticket: HistoricalTicket, vector: Vec<f32>) -> Result<(), IndexError> {
        match self.dimension {
            Some(expected) if vector.len() != expected => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }
        self.cache
            .insert(ticket.id.clone(), ticket.category_text.clone(), vector);
        match self.positions.get(&ticket.id) {
            Some(&position) => self.tickets[position] = ticket,
            None => {
                self.positions.insert(ticket.id.clone(), self.tickets.len());
                self.tickets.push(ticket);
            }
        }
        Ok(())
    }

    fn rank(
        &self,
        query: &[f32],
        k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SimilarityMatch>, IndexError> {
        if k == 0 || self.tickets.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored = Vec::with_capacity(self.tickets.len());
        for (position, ticket) in self.tickets.iter().enumerate() {
            let vector = self.cache.vector(&ticket.id).ok_or_else(|| {
                IndexError::Unavailable(format!("missing embedding for ticket {}", ticket.id))
            })?;
            scored.push((metric.distance(vector, query)?, position));
        }
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(rank, (distance, position))| SimilarityMatch {
                ticket: self.tickets[position].clone(),
                distance,
                rank,
            })
            .collect())
    }
}

/// Similarity index backed by an [`EmbeddingProvider`].
pub struct SimilarityIndex {
    provider: Arc<dyn EmbeddingProvider>,
    metric: DistanceMetric,
    corpus: RwLock<Corpus>,
    write_lock: tokio::sync::Mutex<()>,
}

impl SimilarityIndex {
    /// Create an empty index ranking by cosine distance.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            metric: DistanceMetric::Cosine,
            corpus: RwLock::new(Corpus::default()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Use a different distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Store a ticket, embedding it unless an embedding for the same text is cached.
    pub async fn upsert(&self, ticket: HistoricalTicket) -> Result<(), IndexError> {
        let _guard = self.write_lock.lock().await;
        let cached = {
            let corpus = self.corpus.read();
            corpus
                .cache
                .lookup(&ticket.id, &ticket.category_text)
                .map(<[f32]>::to_vec)
        };
        let vector = match cached {
            Some(vector) => vector,
            None => self.provider.embed(&ticket.category_text).await?,
        };
        debug!("upserting ticket (ticket_id={})", ticket.id);
        self.corpus.write().insert(ticket, vector)
    }

    /// Return the `k` closest tickets by ascending distance.
    ///
    /// Equal distances keep insertion order. An empty corpus yields an empty
    /// result, but the query text is still embedded so invalid input fails.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SimilarityMatch>, IndexError> {
        let query = self.provider.embed(text).await?;
        let corpus = self.corpus.read();
        if let Some(expected) = corpus.dimension {
            if query.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }
        let matches = corpus.rank(&query, k, self.metric)?;
        debug!(
            "index query complete (k={}, corpus={}, returned={})",
            k,
            corpus.tickets.len(),
            matches.len()
        );
        Ok(matches)
    }

    /// Replace the whole corpus.
    ///
    /// Tickets whose embedding fails are skipped and reported; the rest are
    /// swapped in together. The embedding cache starts empty for the new corpus.
    pub async fn replace_corpus(&self, tickets: Vec<HistoricalTicket>) -> CorpusBuild {
        let _guard = self.write_lock.lock().await;
        let mut fresh = Corpus::default();
        let mut failures = Vec::new();
        for ticket in tickets {
            let ticket_id = ticket.id.clone();
            let inserted = match self.provider.embed(&ticket.category_text).await {
                Ok(vector) => fresh.insert(ticket, vector),
                Err(err) => Err(err),
            };
            if let Err(err) = inserted {
                warn!(
                    "skipping ticket during rebuild (ticket_id={}, error={})",
                    ticket_id, err
                );
                failures.push((ticket_id, err));
            }
        }
        let indexed = fresh.tickets.len();
        *self.corpus.write() = fresh;
        info!(
            "corpus replaced (indexed={}, failed={})",
            indexed,
            failures.len()
        );
        CorpusBuild { indexed, failures }
    }

    /// Drop every ticket and cached embedding.
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;
        *self.corpus.write() = Corpus::default();
        info!("corpus cleared");
    }

    pub fn len(&self) -> usize {
        self.corpus.read().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.corpus.read().positions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<HistoricalTicket> {
        let corpus = self.corpus.read();
        corpus
            .positions
            .get(id)
            .map(|&position| corpus.tickets[position].clone())
    }

    /// Snapshot of the stored tickets in insertion order.
    pub fn tickets(&self) -> Vec<HistoricalTicket> {
        self.corpus.read().tickets.clone()
    }

    /// Dimension fixed by the first stored vector.
    pub fn dimension(&self) -> Option<usize> {
        self.corpus.read().dimension
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.corpus.read().cache.stats()
    }
}
