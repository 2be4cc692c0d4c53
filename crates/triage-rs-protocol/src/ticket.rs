//! Historical ticket records and ranked similarity matches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a historical ticket (the `Ticket_ID` column).
pub type TicketId = String;

/// A resolved (or partially resolved) ticket from the historical corpus.
///
/// Tickets are immutable once loaded. Embeddings are not stored here; the
/// similarity index keeps them in its own cache keyed by [`TicketId`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalTicket {
    /// Unique ticket id.
    pub id: TicketId,
    /// Issue description used for embedding.
    pub category_text: String,
    /// Recorded solution text (stored, never embedded).
    pub solution_text: String,
    /// When the ticket was opened, if known.
    pub opened_at: Option<DateTime<Utc>>,
    /// When the ticket was resolved, if it was.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Team the ticket was assigned to.
    pub team: String,
}

impl HistoricalTicket {
    /// Build a ticket without resolution data.
    pub fn new(
        id: impl Into<TicketId>,
        category_text: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            category_text: category_text.into(),
            solution_text: String::new(),
            opened_at: None,
            resolved_at: None,
            team: team.into(),
        }
    }

    /// Attach a solution text.
    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution_text = solution.into();
        self
    }

    /// Attach open and resolution timestamps.
    pub fn with_timeline(
        mut self,
        opened_at: DateTime<Utc>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.opened_at = Some(opened_at);
        self.resolved_at = resolved_at;
        self
    }

    /// Hours between open and resolution.
    ///
    /// `None` when either timestamp is missing or the timeline is inverted;
    /// such tickets still vote for a team but never contribute to estimates.
    pub fn resolution_hours(&self) -> Option<f64> {
        let opened_at = self.opened_at?;
        let resolved_at = self.resolved_at?;
        if resolved_at < opened_at {
            return None;
        }
        let seconds = (resolved_at - opened_at).num_milliseconds() as f64 / 1000.0;
        Some(seconds / 3600.0)
    }
}

/// One entry of a ranked nearest-neighbour result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityMatch {
    /// Matched historical ticket.
    pub ticket: HistoricalTicket,
    /// Cosine distance to the query, in `[0, 2]`.
    pub distance: f64,
    /// Zero-based position in the ranking.
    pub rank: usize,
}

#[cfg(test)]
mod tests {
    use super::HistoricalTicket;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn resolution_hours_requires_both_timestamps() {
        let opened = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let resolved = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();

        let ticket = HistoricalTicket::new("T1", "wifi drops", "Network");
        assert_eq!(ticket.resolution_hours(), None);

        let open_only = ticket.clone().with_timeline(opened, None);
        assert_eq!(open_only.resolution_hours(), None);

        let resolved_ticket = ticket.with_timeline(opened, Some(resolved));
        assert_eq!(resolved_ticket.resolution_hours(), Some(6.5));
    }

    #[test]
    fn inverted_timeline_has_no_duration() {
        let opened = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let resolved = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let ticket =
            HistoricalTicket::new("T2", "crash", "Software").with_timeline(opened, Some(resolved));
        assert_eq!(ticket.resolution_hours(), None);
    }
}
