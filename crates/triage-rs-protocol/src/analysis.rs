//! Analysis results and conversation turns.

use crate::ticket::SimilarityMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an analysis result came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Derived from weighted voting over similar historical tickets.
    Historical,
    /// Produced by the generative fallback model.
    Generative,
}

impl AnalysisSource {
    /// Return the source as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisSource::Historical => "historical",
            AnalysisSource::Generative => "generative",
        }
    }
}

/// Estimated time-to-resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "status", content = "hours")]
pub enum ResolutionEstimate {
    /// Estimate in hours.
    Hours(f64),
    /// No estimate could be produced.
    Unavailable,
}

impl ResolutionEstimate {
    /// Hours if the estimate is available.
    pub fn hours(&self) -> Option<f64> {
        match self {
            ResolutionEstimate::Hours(hours) => Some(*hours),
            ResolutionEstimate::Unavailable => None,
        }
    }

    /// Whether the estimate is available.
    pub fn is_available(&self) -> bool {
        matches!(self, ResolutionEstimate::Hours(_))
    }
}

/// Why historical evidence was judged insufficient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FallbackReason {
    /// Retrieval produced no matches.
    NoMatches,
    /// Winning team's vote share fell below the threshold.
    LowConfidence { confidence: f64, threshold: f64 },
    /// No match carried both open and resolution timestamps.
    NoResolutionData,
}

/// Outcome of analyzing one issue description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    /// Team the issue is assigned to.
    pub assigned_team: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Estimated time-to-resolution.
    pub estimate: ResolutionEstimate,
    /// Whether the result is corpus-derived or generative.
    pub source: AnalysisSource,
    /// Historical matches considered, ordered by ascending distance.
    #[serde(default)]
    pub supporting_matches: Vec<SimilarityMatch>,
    /// Explanation reported by the generative model, if any.
    #[serde(default)]
    pub rationale: Option<String>,
    /// Reasons the fallback was taken; empty for historical results.
    #[serde(default)]
    pub fallback_reasons: Vec<FallbackReason>,
}

impl AnalysisResult {
    /// Estimated hours, if available.
    pub fn estimated_resolution_hours(&self) -> Option<f64> {
        self.estimate.hours()
    }
}

/// One query/result pair in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// Raw query text submitted by the user.
    pub query_text: String,
    /// Result returned for the query.
    pub result: AnalysisResult,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
    /// Set once the user accepts the answer; unresolved turns feed query augmentation.
    #[serde(default)]
    pub resolved: bool,
    /// Query after it was joined with the open issue's earlier turns.
    ///
    /// Carries the first question of an unresolved run forward, so a third
    /// follow-up still searches with it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
}

impl ConversationTurn {
    /// Create an unresolved turn stamped with the current time.
    pub fn new(query_text: impl Into<String>, result: AnalysisResult) -> Self {
        Self {
            query_text: query_text.into(),
            result,
            timestamp: Utc::now(),
            resolved: false,
            search_text: None,
        }
    }

    pub fn with_search_text(mut self, search_text: impl Into<String>) -> Self {
        self.search_text = Some(search_text.into());
        self
    }

    /// Text a follow-up should build on: the augmented query when one was
    /// recorded, otherwise the raw query.
    pub fn context_text(&self) -> &str {
        self.search_text.as_deref().unwrap_or(&self.query_text)
    }
}
