//! Retrieval-and-decision core for support-ticket triage.
//!
//! This crate owns corpus ingestion, the retrieval agent, the weighted-vote
//! decision engine, the generative fallback, conversation sessions, and the
//! optional live ticket ledger. [`Analyzer`] ties them together.

pub mod analyzer;
pub mod conversation;
pub mod decision;
pub mod error;
pub mod fallback;
pub mod generation;
pub mod ingest;
pub mod ledger;
pub mod retrieval;
pub mod sessions;
pub mod summarizer;

pub use analyzer::Analyzer;
pub use conversation::ConversationContext;
pub use decision::{Decision, DecisionEngine, TeamVote, Verdict, vote_weight};
pub use error::{GenerationError, TriageError};
pub use fallback::FallbackAdvisor;
pub use generation::{GenerativeModel, HttpChatModel, Prompt, Recommendation, parse_recommendation};
pub use ingest::{
    IngestReport, RowError, TicketRow, load_rows_jsonl, parse_timestamp, rows_from_json_str,
    validate_row, validate_rows,
};
pub use ledger::{LedgerError, LedgerMessage, LedgerTicket, NewTicket, TicketLedger, TicketStatus};
pub use retrieval::{RetrievalAgent, augment_query};
pub use sessions::{SessionStore, SessionSummary};
pub use summarizer::{IssueSummarizer, IssueSummary};
/// Event sink re-exported for callers wiring observers.
pub use triage_rs_protocol::EventSink;
