//! In-memory session store; one isolated conversation context per session.

use crate::conversation::ConversationContext;
use crate::error::TriageError;
use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use triage_rs_protocol::{ConversationTurn, SessionId};
use uuid::Uuid;

/// Summary used when listing sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub id: SessionId,
    /// Retained turns.
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent turn, or creation time.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    context: ConversationContext,
    created_at: DateTime<Utc>,
}

/// Session storage shared by every analyzer handle.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    /// Retention bound applied to new sessions.
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_turns,
        }
    }

    pub fn create_session(&self) -> SessionId {
        let session_id = Uuid::new_v4();
        let entry = SessionEntry {
            context: ConversationContext::new(self.max_turns),
            created_at: Utc::now(),
        };
        self.sessions.write().insert(session_id, entry);
        info!(
            "created session (session_id={}, max_turns={})",
            session_id, self.max_turns
        );
        session_id
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.read().contains_key(&session_id)
    }

    /// All retained turns, most recent last.
    pub fn history(&self, session_id: SessionId) -> Result<Vec<ConversationTurn>, TriageError> {
        self.with_context(session_id, |context| context.turns())
    }

    /// The last `window` turns, most recent last.
    pub fn recent(
        &self,
        session_id: SessionId,
        window: usize,
    ) -> Result<Vec<ConversationTurn>, TriageError> {
        self.with_context(session_id, |context| context.recent(window))
    }

    pub fn append_turn(
        &self,
        session_id: SessionId,
        turn: ConversationTurn,
    ) -> Result<(), TriageError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(TriageError::UnknownSession(session_id))?;
        debug!(
            "appending turn (session_id={}, team={}, source={})",
            session_id,
            turn.result.assigned_team,
            turn.result.source.as_str()
        );
        entry.context.append(turn);
        Ok(())
    }

    /// Mark the latest turn as accepted so later queries stop inheriting it.
    pub fn mark_resolved(&self, session_id: SessionId) -> Result<bool, TriageError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(TriageError::UnknownSession(session_id))?;
        Ok(entry.context.mark_last_resolved())
    }

    /// Clear the history of a session but keep the session.
    pub fn reset_session(&self, session_id: SessionId) -> Result<(), TriageError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(TriageError::UnknownSession(session_id))?;
        entry.context.reset();
        info!("reset session (session_id={})", session_id);
        Ok(())
    }

    pub fn delete_session(&self, session_id: SessionId) -> bool {
        let removed = self.sessions.write().remove(&session_id).is_some();
        info!(
            "deleting session (session_id={}, removed={})",
            session_id, removed
        );
        removed
    }

    /// Summaries ordered by most recent activity first.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .iter()
            .map(|(id, entry)| {
                let turns = entry.context.recent(1);
                SessionSummary {
                    id: *id,
                    turn_count: entry.context.len(),
                    created_at: entry.created_at,
                    updated_at: turns
                        .last()
                        .map(|turn| turn.timestamp)
                        .unwrap_or(entry.created_at),
                }
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    fn with_context<T>(
        &self,
        session_id: SessionId,
        f: impl FnOnce(&ConversationContext) -> T,
    ) -> Result<T, TriageError> {
        let sessions = self.sessions.read();
        let entry = sessions
            .get(&session_id)
            .ok_or(TriageError::UnknownSession(session_id))?;
        Ok(f(&entry.context))
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStore;
    use crate::error::TriageError;
    use pretty_assertions::assert_eq;
    use triage_rs_protocol::{AnalysisResult, AnalysisSource, ConversationTurn, ResolutionEstimate};
    use uuid::Uuid;

    fn turn(text: &str) -> ConversationTurn {
        ConversationTurn::new(
            text,
            AnalysisResult {
                assigned_team: "Account".to_string(),
                confidence: 0.8,
                estimate: ResolutionEstimate::Hours(1.0),
                source: AnalysisSource::Historical,
                supporting_matches: Vec::new(),
                rationale: None,
                fallback_reasons: Vec::new(),
            },
        )
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new(10);
        let first = store.create_session();
        let second = store.create_session();
        store.append_turn(first, turn("login fails")).expect("append");

        assert_eq!(store.history(first).expect("first").len(), 1);
        assert!(store.history(second).expect("second").is_empty());
    }

    #[test]
    fn reset_keeps_session_and_delete_removes_it() {
        let store = SessionStore::new(10);
        let session = store.create_session();
        store.append_turn(session, turn("login fails")).expect("append");
        store.reset_session(session).expect("reset");
        assert!(store.history(session).expect("history").is_empty());

        assert!(store.delete_session(session));
        assert!(!store.delete_session(session));
        assert!(matches!(
            store.history(session),
            Err(TriageError::UnknownSession(id)) if id == session
        ));
    }

    #[test]
    fn unknown_session_is_reported() {
        let store = SessionStore::new(10);
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.append_turn(missing, turn("x")),
            Err(TriageError::UnknownSession(_))
        ));
        assert!(matches!(
            store.mark_resolved(missing),
            Err(TriageError::UnknownSession(_))
        ));
    }

    #[test]
    fn list_sessions_reports_turn_counts() {
        let store = SessionStore::new(1);
        let session = store.create_session();
        store.append_turn(session, turn("a")).expect("append");
        store.append_turn(session, turn("b")).expect("append");
        let summaries = store.list_sessions();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, session);
        assert_eq!(summaries[0].turn_count, 1);
        assert!(store.mark_resolved(session).expect("mark"));
    }
}
