//! Shared data model for triage: tickets, matches, results, turns, and events.

mod analysis;
mod ticket;

pub use analysis::{
    AnalysisResult, AnalysisSource, ConversationTurn, FallbackReason, ResolutionEstimate,
};
pub use ticket::{HistoricalTicket, SimilarityMatch, TicketId};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one conversation held by the session store.
pub type SessionId = Uuid;

/// Wrapper for events emitted while analyzing issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageEvent {
    pub id: Uuid,
    /// Session the event belongs to, if any.
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl TriageEvent {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(session_id: Option<SessionId>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            created_at: Utc::now(),
            payload,
        }
    }
}

/// All events emitted during analysis and corpus maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum EventPayload {
    /// An analysis request was accepted.
    AnalysisStarted { query_text: String, k: usize },
    /// Retrieval finished.
    MatchesRetrieved { count: usize },
    /// Historical evidence was insufficient.
    FallbackTriggered { reasons: Vec<FallbackReason> },
    /// Analysis finished with a result.
    AnalysisCompleted {
        assigned_team: String,
        source: AnalysisSource,
        confidence: f64,
    },
    /// The corpus was replaced.
    CorpusReloaded {
        indexed: usize,
        rejected: usize,
        skipped: usize,
    },
}

/// Receives [`TriageEvent`]s; implementations must not block the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TriageEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn payload_is_tagged_by_type() {
        let event = TriageEvent::new(
            None,
            EventPayload::FallbackTriggered {
                reasons: vec![FallbackReason::LowConfidence {
                    confidence: 0.4,
                    threshold: 0.5,
                }],
            },
        );
        let wire = serde_json::to_value(&event).expect("serialize");
        assert_eq!(wire["session_id"], serde_json::Value::Null);
        assert_eq!(wire["payload"]["type"], "fallback_triggered");
        let parsed: TriageEvent = serde_json::from_value(wire).expect("deserialize");
        assert!(matches!(
            parsed.payload,
            EventPayload::FallbackTriggered { ref reasons } if reasons.len() == 1
        ));
    }
}
