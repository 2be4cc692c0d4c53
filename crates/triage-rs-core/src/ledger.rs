//! Live ticket ledger persisted as an append-only JSONL event log.
//!
//! The first line of the file is a schema header; every later line is one
//! ticket event. Opening the ledger replays the log into memory.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use triage_rs_protocol::HistoricalTicket;

use crate::error::TriageError;

const SCHEMA_VERSION: u32 = 1;
const TICKET_PREFIX: &str = "TECH_";
const FIRST_TICKET_NUMBER: u64 = 200;

/// Errors returned by the ticket ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(u32),
    #[error("missing schema header")]
    MissingHeader,
    #[error("unknown ticket: {0}")]
    UnknownTicket(String),
    #[error("ticket {ticket_id} is {status}")]
    InvalidTransition {
        ticket_id: String,
        status: TicketStatus,
    },
}

impl From<LedgerError> for TriageError {
    fn from(err: LedgerError) -> Self {
        TriageError::Ledger(err.to_string())
    }
}

/// Lifecycle state of a live ticket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    Resolved,
    #[serde(rename = "Needs Human Agent")]
    NeedsHumanAgent,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::Resolved => "Resolved",
            TicketStatus::NeedsHumanAgent => "Needs Human Agent",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a ticket's conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerMessage {
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for opening a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTicket {
    pub summary: String,
    pub sentiment: String,
    pub priority: String,
    pub assigned_team: String,
}

impl NewTicket {
    pub fn new(
        summary: impl Into<String>,
        assigned_team: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            sentiment: String::new(),
            priority: priority.into(),
            assigned_team: assigned_team.into(),
        }
    }

    pub fn with_sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = sentiment.into();
        self
    }
}

/// A live ticket reconstructed from the event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerTicket {
    pub id: String,
    pub summary: String,
    pub sentiment: String,
    pub priority: String,
    pub assigned_team: String,
    pub status: TicketStatus,
    pub solution: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub conversation: Vec<LedgerMessage>,
}

impl LedgerTicket {
    /// Historical form of a resolved ticket; `None` for anything else.
    pub fn to_historical(&self) -> Option<HistoricalTicket> {
        if self.status != TicketStatus::Resolved {
            return None;
        }
        Some(
            HistoricalTicket::new(self.id.clone(), self.summary.clone(), self.assigned_team.clone())
                .with_solution(self.solution.clone().unwrap_or_default())
                .with_timeline(self.opened_at, self.resolved_at),
        )
    }

    fn matches(&self, needle: &str) -> bool {
        self.summary.to_lowercase().contains(needle)
            || self
                .solution
                .as_deref()
                .is_some_and(|solution| solution.to_lowercase().contains(needle))
            || self
                .conversation
                .iter()
                .any(|message| message.content.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LedgerEvent {
    SchemaVersion {
        version: u32,
    },
    TicketOpened {
        ticket_id: String,
        summary: String,
        sentiment: String,
        priority: String,
        assigned_team: String,
        opened_at: DateTime<Utc>,
    },
    MessageAppended {
        ticket_id: String,
        role: String,
        content: String,
        created_at: DateTime<Utc>,
    },
    TicketResolved {
        ticket_id: String,
        solution: String,
        resolved_at: DateTime<Utc>,
    },
    TicketFlagged {
        ticket_id: String,
        flagged_at: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
struct LedgerState {
    version: Option<u32>,
    tickets: Vec<LedgerTicket>,
    positions: HashMap<String, usize>,
    next_number: u64,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            next_number: FIRST_TICKET_NUMBER,
            ..Self::default()
        }
    }

    fn ticket(&self, ticket_id: &str) -> Result<&LedgerTicket, LedgerError> {
        self.positions
            .get(ticket_id)
            .map(|position| &self.tickets[*position])
            .ok_or_else(|| LedgerError::UnknownTicket(ticket_id.to_string()))
    }

    fn ticket_mut(&mut self, ticket_id: &str) -> Result<&mut LedgerTicket, LedgerError> {
        match self.positions.get(ticket_id) {
            Some(position) => Ok(&mut self.tickets[*position]),
            None => Err(LedgerError::UnknownTicket(ticket_id.to_string())),
        }
    }

    /// Check that `event` can be applied without mutating anything.
    fn check(&self, event: &LedgerEvent) -> Result<(), LedgerError> {
        match event {
            LedgerEvent::SchemaVersion { .. } | LedgerEvent::TicketOpened { .. } => Ok(()),
            LedgerEvent::MessageAppended { ticket_id, .. } => self.ticket(ticket_id).map(|_| ()),
            LedgerEvent::TicketResolved { ticket_id, .. }
            | LedgerEvent::TicketFlagged { ticket_id, .. } => {
                let ticket = self.ticket(ticket_id)?;
                if ticket.status == TicketStatus::Resolved {
                    return Err(LedgerError::InvalidTransition {
                        ticket_id: ticket_id.clone(),
                        status: ticket.status,
                    });
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, event: LedgerEvent) -> Result<(), LedgerError> {
        if self.version.is_none() && !matches!(event, LedgerEvent::SchemaVersion { .. }) {
            return Err(LedgerError::MissingHeader);
        }
        self.check(&event)?;
        match event {
            LedgerEvent::SchemaVersion { version } => {
                if version > SCHEMA_VERSION {
                    return Err(LedgerError::UnsupportedSchema(version));
                }
                self.version = Some(version);
            }
            LedgerEvent::TicketOpened {
                ticket_id,
                summary,
                sentiment,
                priority,
                assigned_team,
                opened_at,
            } => {
                if let Some(number) = ticket_number(&ticket_id) {
                    self.next_number = self.next_number.max(number + 1);
                }
                let ticket = LedgerTicket {
                    id: ticket_id.clone(),
                    summary,
                    sentiment,
                    priority,
                    assigned_team,
                    status: TicketStatus::Open,
                    solution: None,
                    opened_at,
                    resolved_at: None,
                    conversation: Vec::new(),
                };
                match self.positions.get(&ticket_id) {
                    Some(position) => self.tickets[*position] = ticket,
                    None => {
                        self.positions.insert(ticket_id, self.tickets.len());
                        self.tickets.push(ticket);
                    }
                }
            }
            LedgerEvent::MessageAppended {
                ticket_id,
                role,
                content,
                created_at,
            } => {
                self.ticket_mut(&ticket_id)?.conversation.push(LedgerMessage {
                    role,
                    content,
                    created_at,
                });
            }
            LedgerEvent::TicketResolved {
                ticket_id,
                solution,
                resolved_at,
            } => {
                let ticket = self.ticket_mut(&ticket_id)?;
                ticket.status = TicketStatus::Resolved;
                ticket.solution = Some(solution);
                ticket.resolved_at = Some(resolved_at);
            }
            LedgerEvent::TicketFlagged { ticket_id, .. } => {
                self.ticket_mut(&ticket_id)?.status = TicketStatus::NeedsHumanAgent;
            }
        }
        Ok(())
    }
}

fn ticket_number(ticket_id: &str) -> Option<u64> {
    ticket_id.strip_prefix(TICKET_PREFIX)?.parse().ok()
}

/// JSONL-backed ticket ledger.
pub struct TicketLedger {
    path: PathBuf,
    state: RwLock<LedgerState>,
    /// Serializes appends so file order matches in-memory order.
    write_lock: Mutex<()>,
}

impl TicketLedger {
    /// Open the ledger at `path`, creating it with a schema header if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let mut state = LedgerState::new();
        if path.exists() {
            let file = OpenOptions::new().read(true).open(&path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let event: LedgerEvent = serde_json::from_str(&line)?;
                state.apply(event)?;
            }
            if state.version.is_none() {
                return Err(LedgerError::MissingHeader);
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let mut file = OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&path)?;
            let header = LedgerEvent::SchemaVersion {
                version: SCHEMA_VERSION,
            };
            writeln!(file, "{}", serde_json::to_string(&header)?)?;
            state.version = Some(SCHEMA_VERSION);
        }
        info!(
            "opened ticket ledger (path={}, tickets={})",
            path.display(),
            state.tickets.len()
        );
        Ok(Self {
            path,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate, persist, then apply one event.
    fn record(&self, event: LedgerEvent) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock();
        self.state.read().check(&event)?;
        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        self.state.write().apply(event)
    }

    /// Open a ticket and return its `TECH_<n>` id.
    pub fn open_ticket(&self, ticket: NewTicket) -> Result<String, LedgerError> {
        let _guard = self.write_lock.lock();
        let ticket_id = format!("{TICKET_PREFIX}{}", self.state.read().next_number);
        let event = LedgerEvent::TicketOpened {
            ticket_id: ticket_id.clone(),
            summary: ticket.summary,
            sentiment: ticket.sentiment,
            priority: ticket.priority,
            assigned_team: ticket.assigned_team,
            opened_at: Utc::now(),
        };
        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        self.state.write().apply(event)?;
        info!("opened ticket (ticket_id={})", ticket_id);
        Ok(ticket_id)
    }

    pub fn append_conversation(
        &self,
        ticket_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), LedgerError> {
        debug!(
            "appending ticket message (ticket_id={}, role={}, content_len={})",
            ticket_id,
            role,
            content.len()
        );
        self.record(LedgerEvent::MessageAppended {
            ticket_id: ticket_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Mark an unresolved ticket as resolved with `solution`.
    pub fn resolve(&self, ticket_id: &str, solution: &str) -> Result<LedgerTicket, LedgerError> {
        self.record(LedgerEvent::TicketResolved {
            ticket_id: ticket_id.to_string(),
            solution: solution.to_string(),
            resolved_at: Utc::now(),
        })?;
        info!("resolved ticket (ticket_id={})", ticket_id);
        self.get(ticket_id)
            .ok_or_else(|| LedgerError::UnknownTicket(ticket_id.to_string()))
    }

    /// Hand an unresolved ticket to a human agent.
    pub fn flag_for_human(&self, ticket_id: &str) -> Result<(), LedgerError> {
        self.record(LedgerEvent::TicketFlagged {
            ticket_id: ticket_id.to_string(),
            flagged_at: Utc::now(),
        })
        .inspect_err(|err| warn!("flag failed (ticket_id={}, error={})", ticket_id, err))?;
        info!("flagged ticket for human agent (ticket_id={})", ticket_id);
        Ok(())
    }

    pub fn get(&self, ticket_id: &str) -> Option<LedgerTicket> {
        self.state.read().ticket(ticket_id).ok().cloned()
    }

    /// Tickets in opening order, optionally filtered by status.
    pub fn list(&self, status: Option<TicketStatus>) -> Vec<LedgerTicket> {
        self.state
            .read()
            .tickets
            .iter()
            .filter(|ticket| status.is_none_or(|status| ticket.status == status))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search; an empty query returns every ticket.
    pub fn search(&self, text: &str) -> Vec<LedgerTicket> {
        let needle = text.trim().to_lowercase();
        self.state
            .read()
            .tickets
            .iter()
            .filter(|ticket| needle.is_empty() || ticket.matches(&needle))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
