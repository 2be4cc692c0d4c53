//! Historical ticket ingestion: raw rows, per-row validation, batch reports.
//!
//! A malformed row never aborts the batch. Each row is validated on its own
//! and failures are collected into an [`IngestReport`] next to the count of
//! accepted tickets.

use crate::error::TriageError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use triage_rs_protocol::{HistoricalTicket, TicketId};

/// One raw tabular row, using the column names of the ticket export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TicketRow {
    #[serde(
        rename = "Ticket_ID",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub ticket_id: Option<String>,
    #[serde(
        rename = "Issue_Category",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub issue_category: Option<String>,
    #[serde(
        rename = "Solution",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub solution: Option<String>,
    #[serde(
        rename = "Ticket_Open_Date",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub ticket_open_date: Option<String>,
    #[serde(
        rename = "Date_of_Resolution",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_of_resolution: Option<String>,
    #[serde(
        rename = "Assigned_To_Team",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to_team: Option<String>,
}

impl TicketRow {
    pub fn new(
        ticket_id: impl Into<String>,
        issue_category: impl Into<String>,
        assigned_to_team: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id: Some(ticket_id.into()),
            issue_category: Some(issue_category.into()),
            assigned_to_team: Some(assigned_to_team.into()),
            ..Self::default()
        }
    }

    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    pub fn with_dates(mut self, opened: impl Into<String>, resolved: Option<&str>) -> Self {
        self.ticket_open_date = Some(opened.into());
        self.date_of_resolution = resolved.map(str::to_string);
        self
    }
}

/// Accept strings, numbers and booleans for any column; spreadsheets export
/// numeric ids without quotes.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

/// A row that could not be turned into an indexed ticket.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("row {row}: {reason}")]
pub struct RowError {
    /// One-based row number within the batch.
    pub row: usize,
    /// Ticket id, when the row had one.
    pub ticket_id: Option<TicketId>,
    pub reason: String,
}

impl RowError {
    fn new(row: usize, ticket_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            row,
            ticket_id: ticket_id.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// Outcome of loading a batch of rows into the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Tickets now indexed.
    pub accepted: usize,
    /// Rows that failed validation.
    pub rejected: Vec<RowError>,
    /// Valid rows whose embedding failed.
    pub skipped: Vec<RowError>,
}

impl IngestReport {
    /// Every row-level problem, rejected first.
    pub fn errors(&self) -> impl Iterator<Item = &RowError> {
        self.rejected.iter().chain(self.skipped.iter())
    }
}

/// Validated tickets paired with their row numbers, plus rejected rows.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub tickets: Vec<(usize, HistoricalTicket)>,
    pub rejected: Vec<RowError>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Parse the timestamp layouts seen in ticket exports. Naive values are UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Validate one row. `row` is the one-based row number used in errors.
///
/// A blank or absent resolution date is accepted; the ticket then votes but
/// does not contribute to resolution estimates.
pub fn validate_row(row: usize, raw: &TicketRow) -> Result<HistoricalTicket, RowError> {
    let ticket_id = non_blank(&raw.ticket_id)
        .ok_or_else(|| RowError::new(row, None, "missing Ticket_ID"))?;
    let category = non_blank(&raw.issue_category)
        .ok_or_else(|| RowError::new(row, Some(ticket_id), "missing Issue_Category"))?;
    let team = non_blank(&raw.assigned_to_team)
        .ok_or_else(|| RowError::new(row, Some(ticket_id), "missing Assigned_To_Team"))?;

    let opened_at = match non_blank(&raw.ticket_open_date) {
        Some(text) => Some(parse_timestamp(text).ok_or_else(|| {
            RowError::new(
                row,
                Some(ticket_id),
                format!("unparsable Ticket_Open_Date: {text}"),
            )
        })?),
        None => None,
    };
    let resolved_at = match non_blank(&raw.date_of_resolution) {
        Some(text) => Some(parse_timestamp(text).ok_or_else(|| {
            RowError::new(
                row,
                Some(ticket_id),
                format!("unparsable Date_of_Resolution: {text}"),
            )
        })?),
        None => None,
    };
    if let (Some(opened), Some(resolved)) = (opened_at, resolved_at) {
        if resolved < opened {
            return Err(RowError::new(
                row,
                Some(ticket_id),
                "Date_of_Resolution precedes Ticket_Open_Date",
            ));
        }
    }

    let mut ticket = HistoricalTicket::new(ticket_id, category, team);
    ticket.solution_text = raw.solution.clone().unwrap_or_default();
    ticket.opened_at = opened_at;
    ticket.resolved_at = resolved_at;
    Ok(ticket)
}

/// Validate a whole batch. Later rows reusing an accepted `Ticket_ID` are rejected.
pub fn validate_rows(rows: &[TicketRow]) -> ValidatedBatch {
    let mut batch = ValidatedBatch::default();
    let mut seen = HashSet::new();
    for (offset, raw) in rows.iter().enumerate() {
        let row = offset + 1;
        match validate_row(row, raw) {
            Ok(ticket) => {
                if seen.insert(ticket.id.clone()) {
                    batch.tickets.push((row, ticket));
                } else {
                    batch.rejected.push(RowError::new(
                        row,
                        Some(&ticket.id),
                        "duplicate Ticket_ID",
                    ));
                }
            }
            Err(err) => batch.rejected.push(err),
        }
    }
    batch
}

/// Read rows from a JSON array or from JSON Lines.
pub fn rows_from_json_str(contents: &str) -> Result<Vec<TicketRow>, TriageError> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(contents).map_err(|err| TriageError::Parse(err.to_string()));
    }
    let mut rows = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(line)
            .map_err(|err| TriageError::Parse(format!("line {}: {err}", idx + 1)))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read rows from a JSON Lines (or JSON array) file.
pub fn load_rows_jsonl(path: impl AsRef<Path>) -> Result<Vec<TicketRow>, TriageError> {
    let contents = fs::read_to_string(path)?;
    rows_from_json_str(&contents)
}
