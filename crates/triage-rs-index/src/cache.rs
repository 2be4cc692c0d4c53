//! Embedding cache keyed by ticket id.
//!
//! An entry is reused only while the embedded text is unchanged, so a
//! re-upserted ticket with a new description is embedded again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use triage_rs_protocol::TicketId;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct CachedVector {
    text: String,
    vector: Vec<f32>,
}

/// Ticket id -> embedding map with hit/miss accounting.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: HashMap<TicketId, CachedVector>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached vector for `id` if it was computed from `text`; records a hit or miss.
    pub fn lookup(&self, id: &str, text: &str) -> Option<&[f32]> {
        match self.entries.get(id) {
            Some(entry) if entry.text == text => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.vector.as_slice())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stored vector for `id` without touching the counters.
    pub fn vector(&self, id: &str) -> Option<&[f32]> {
        self.entries.get(id).map(|entry| entry.vector.as_slice())
    }

    pub fn insert(&mut self, id: TicketId, text: impl Into<String>, vector: Vec<f32>) {
        self.entries.insert(
            id,
            CachedVector {
                text: text.into(),
                vector,
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheStats, EmbeddingCache};
    use pretty_assertions::assert_eq;

    #[test]
    fn lookup_counts_hits_and_misses() {
        let mut cache = EmbeddingCache::new();
        assert!(cache.lookup("T1", "wifi").is_none());
        cache.insert("T1".to_string(), "wifi", vec![1.0, 0.0]);
        assert_eq!(cache.lookup("T1", "wifi"), Some(&[1.0f32, 0.0][..]));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn changed_text_is_a_miss() {
        let mut cache = EmbeddingCache::new();
        cache.insert("T1".to_string(), "wifi", vec![1.0]);
        assert!(cache.lookup("T1", "vpn").is_none());
        assert!(cache.contains("T1"));
    }

    #[test]
    fn clear_resets_entries_and_counters() {
        let mut cache = EmbeddingCache::new();
        cache.insert("T1".to_string(), "wifi", vec![1.0]);
        let _ = cache.lookup("T1", "wifi");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
