//! Per-session conversation history with bounded retention.

use std::collections::VecDeque;
use triage_rs_protocol::ConversationTurn;

/// Ordered turns of one session, oldest first.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    turns: VecDeque<ConversationTurn>,
    /// Maximum retained turns; `0` keeps everything.
    max_turns: usize,
}

impl ConversationContext {
    /// Create a context retaining at most `max_turns` turns (`0` = unbounded).
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns,
        }
    }

    /// Record a turn, evicting the oldest ones beyond the retention bound.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        if self.max_turns > 0 {
            while self.turns.len() > self.max_turns {
                self.turns.pop_front();
            }
        }
    }

    /// The last `window` turns, most recent last.
    pub fn recent(&self, window: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(window);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// All retained turns, most recent last.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    pub fn reset(&mut self) {
        self.turns.clear();
    }

    /// Mark the most recent turn as accepted. Returns false on an empty history.
    pub fn mark_last_resolved(&mut self) -> bool {
        match self.turns.back_mut() {
            Some(turn) => {
                turn.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Most recent turn the user has not accepted yet.
    pub fn last_unresolved(&self) -> Option<&ConversationTurn> {
        self.turns.iter().rev().find(|turn| !turn.resolved)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}
