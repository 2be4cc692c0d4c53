//! Retrieval agent: validates queries, blends in conversation context, and
//! asks the similarity index for ranked matches.

use crate::error::TriageError;
use log::debug;
use std::sync::Arc;
use triage_rs_index::SimilarityIndex;
use triage_rs_protocol::{ConversationTurn, SimilarityMatch};

/// Prefix `query_text` with the context of the latest unresolved turn.
///
/// That context already includes every earlier turn of the same open issue,
/// so follow-ups such as "actually it's on staging" keep the original
/// question however long the chain. Returns the trimmed query unchanged when
/// every turn is resolved.
pub fn augment_query(query_text: &str, history: &[ConversationTurn]) -> String {
    let query_text = query_text.trim();
    let context = history
        .iter()
        .rev()
        .find(|turn| !turn.resolved)
        .map(|turn| turn.context_text().trim())
        .filter(|context| !context.is_empty());
    match context {
        Some(context) => format!("{context} {query_text}"),
        None => query_text.to_string(),
    }
}

/// Wraps the index with query validation and augmentation.
#[derive(Clone)]
pub struct RetrievalAgent {
    index: Arc<SimilarityIndex>,
    augment_with_history: bool,
}

impl RetrievalAgent {
    pub fn new(index: Arc<SimilarityIndex>, augment_with_history: bool) -> Self {
        Self {
            index,
            augment_with_history,
        }
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    /// Text that will be embedded for this query.
    pub fn search_text(&self, query_text: &str, history: &[ConversationTurn]) -> String {
        if self.augment_with_history {
            augment_query(query_text, history)
        } else {
            query_text.trim().to_string()
        }
    }

    /// Ranked matches for `query_text`, closest first.
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: usize,
        history: &[ConversationTurn],
    ) -> Result<Vec<SimilarityMatch>, TriageError> {
        if query_text.trim().is_empty() {
            return Err(TriageError::Validation("query text is empty".to_string()));
        }
        if k == 0 {
            return Err(TriageError::Validation(
                "k must be greater than zero".to_string(),
            ));
        }
        let search_text = self.search_text(query_text, history);
        debug!(
            "retrieving matches (k={}, history={}, augmented={})",
            k,
            history.len(),
            search_text.len() != query_text.trim().len()
        );
        Ok(self.index.query(&search_text, k).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use triage_rs_index::HashedEmbedding;
    use triage_rs_protocol::{AnalysisResult, AnalysisSource, HistoricalTicket, ResolutionEstimate};

    fn turn(text: &str, resolved: bool) -> ConversationTurn {
        let mut turn = ConversationTurn::new(
            text,
            AnalysisResult {
                assigned_team: "Network".to_string(),
                confidence: 0.0,
                estimate: ResolutionEstimate::Unavailable,
                source: AnalysisSource::Generative,
                supporting_matches: Vec::new(),
                rationale: None,
                fallback_reasons: Vec::new(),
            },
        );
        turn.resolved = resolved;
        turn
    }

    #[test]
    fn augments_with_latest_unresolved_turn() {
        let history = vec![turn("vpn drops", false), turn("printer jam", true)];
        assert_eq!(
            augment_query("  only on staging ", &history),
            "vpn drops only on staging"
        );
    }

    #[test]
    fn chained_follow_ups_keep_the_first_question() {
        let first = turn("wifi router drops connection", false);
        let second_text = augment_query("only at night", std::slice::from_ref(&first));
        let second = turn("only at night", false).with_search_text(second_text);
        let history = vec![first, second];
        assert_eq!(
            augment_query("and on weekends", &history),
            "wifi router drops connection only at night and on weekends"
        );
    }

    #[test]
    fn no_augmentation_without_open_turns() {
        assert_eq!(augment_query("vpn drops", &[]), "vpn drops");
        let history = vec![turn("printer jam", true)];
        assert_eq!(augment_query("vpn drops", &history), "vpn drops");
    }

    #[tokio::test]
    async fn rejects_blank_query_and_zero_k() {
        let index = Arc::new(SimilarityIndex::new(Arc::new(HashedEmbedding::new(32))));
        index
            .upsert(HistoricalTicket::new("T1", "vpn drops", "Network"))
            .await
            .expect("upsert");
        let agent = RetrievalAgent::new(index, true);
        assert!(matches!(
            agent.retrieve("   ", 3, &[]).await,
            Err(TriageError::Validation(_))
        ));
        assert!(matches!(
            agent.retrieve("vpn", 0, &[]).await,
            Err(TriageError::Validation(_))
        ));
        assert_eq!(agent.retrieve("vpn", 3, &[]).await.expect("query").len(), 1);
    }

    #[test]
    fn augmentation_can_be_disabled() {
        let index = Arc::new(SimilarityIndex::new(Arc::new(HashedEmbedding::new(32))));
        let agent = RetrievalAgent::new(index, false);
        let history = vec![turn("vpn drops", false)];
        assert_eq!(agent.search_text("on staging", &history), "on staging");
    }
}
