//! Error types for the triage core crate.

use std::time::Duration;
use thiserror::Error;
use triage_rs_index::IndexError;
use triage_rs_protocol::SessionId;

/// Errors returned by analyzer operations.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Bad caller input such as an empty query or `k == 0`.
    #[error("validation error: {0}")]
    Validation(String),
    /// The embedding provider rejected the input.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Retrieval or storage failure in the similarity index.
    #[error("index error: {0}")]
    Index(String),
    /// Session id is unknown.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    /// Ticket ledger failure.
    #[error("ledger error: {0}")]
    Ledger(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config or input parsing error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<IndexError> for TriageError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Embedding(message) => TriageError::Embedding(message),
            other => TriageError::Index(other.to_string()),
        }
    }
}

/// Failures of the generative model boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    /// Request could not be sent or the connection failed.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The model did not answer before the deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The model answered with something that is not a usable recommendation.
    #[error("unparsable response: {0}")]
    Parse(String),
    /// The endpoint returned a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}
