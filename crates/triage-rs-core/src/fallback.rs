//! Fallback advisor: asks the generative model for a recommendation when
//! historical evidence is insufficient.
//!
//! Generation failures never escape. A timeout, transport error, or
//! unparsable answer becomes a degraded result with the unassigned team and
//! an unavailable estimate.

use crate::error::GenerationError;
use crate::generation::{GenerativeModel, Prompt, Recommendation, parse_recommendation};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use triage_rs_config::{FallbackConfig, TeamProfile};
use triage_rs_protocol::{
    AnalysisResult, AnalysisSource, ConversationTurn, FallbackReason, ResolutionEstimate,
    SimilarityMatch,
};

const SYSTEM_PROMPT: &str = "You are a technical support team assignment expert. \
Analyze the support issue, assign it to the most appropriate team, explain the assignment, \
and estimate how many hours resolution will take based on the complexity of the issue.";

/// Generative fallback with prompt assembly and failure degradation.
#[derive(Clone)]
pub struct FallbackAdvisor {
    model: Option<Arc<dyn GenerativeModel>>,
    timeout: Duration,
    advisory_confidence: f64,
    unassigned_team: String,
    history_window: usize,
    max_context_matches: usize,
    teams: Vec<TeamProfile>,
}

impl FallbackAdvisor {
    /// Create an advisor; without a model every recommendation degrades.
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, config: &FallbackConfig) -> Self {
        Self {
            model,
            timeout: Duration::from_millis(config.timeout_ms),
            advisory_confidence: config.advisory_confidence,
            unassigned_team: config.unassigned_team.clone(),
            history_window: config.history_window,
            max_context_matches: config.max_context_matches,
            teams: config.teams.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Assemble the prompt from the issue, a bounded history window, and weak matches.
    pub fn build_prompt(
        &self,
        query_text: &str,
        history: &[ConversationTurn],
        partial_matches: &[SimilarityMatch],
    ) -> Prompt {
        let mut user = String::new();

        let skip = history.len().saturating_sub(self.history_window);
        let window = &history[skip..];
        if !window.is_empty() {
            user.push_str("Previous conversation:\n");
            for turn in window {
                let _ = writeln!(user, "user: {}", turn.query_text);
                let estimate = match turn.result.estimate.hours() {
                    Some(hours) => format!("{hours:.1} hours"),
                    None => "no estimate".to_string(),
                };
                let _ = writeln!(
                    user,
                    "assistant: assigned to {} ({})",
                    turn.result.assigned_team, estimate
                );
            }
            user.push('\n');
        }

        let context: Vec<&SimilarityMatch> =
            partial_matches.iter().take(self.max_context_matches).collect();
        if !context.is_empty() {
            user.push_str(
                "These are loosely related past tickets; treat them as hints only:\n",
            );
            for entry in context {
                let resolution = match entry.ticket.resolution_hours() {
                    Some(hours) => format!("resolved in {hours:.1} hours"),
                    None => "no resolution data".to_string(),
                };
                let _ = writeln!(
                    user,
                    "- [{}] {} -> {} team, {} (distance {:.2})",
                    entry.ticket.id,
                    entry.ticket.category_text,
                    entry.ticket.team,
                    resolution,
                    entry.distance
                );
            }
            user.push('\n');
        }

        let _ = writeln!(user, "Given this technical support issue: '{}'", query_text.trim());
        user.push('\n');
        if !self.teams.is_empty() {
            let names: Vec<&str> = self.teams.iter().map(|team| team.name.as_str()).collect();
            let _ = writeln!(user, "Assign it to one of these teams: {}.", names.join(", "));
            user.push_str("\nTeams and their responsibilities:\n");
            for team in &self.teams {
                let _ = writeln!(user, "- {}: {}", team.name, team.responsibilities);
            }
            user.push('\n');
        }
        user.push_str(
            "Respond in JSON with the keys assigned_team, reason, and \
             estimated_resolution_hours (a number).\n\
             Only return the JSON object, with no other text.",
        );

        Prompt::new(SYSTEM_PROMPT, user)
    }

    /// Call the model under the configured deadline and parse its answer.
    pub async fn request(&self, prompt: &Prompt) -> Result<Recommendation, GenerationError> {
        let model = self.model.as_ref().ok_or_else(|| {
            GenerationError::Transport("no generative model configured".to_string())
        })?;
        let raw = tokio::time::timeout(self.timeout, model.generate(prompt))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;
        debug!("fallback response received (len={})", raw.len());
        parse_recommendation(&raw)
    }

    /// Produce a generative result; never fails.
    pub async fn recommend(
        &self,
        query_text: &str,
        history: &[ConversationTurn],
        partial_matches: Vec<SimilarityMatch>,
        reasons: Vec<FallbackReason>,
    ) -> AnalysisResult {
        let prompt = self.build_prompt(query_text, history, &partial_matches);
        match self.request(&prompt).await {
            Ok(recommendation) => {
                info!(
                    "fallback recommendation (team={}, hours={:.2})",
                    recommendation.team, recommendation.estimated_hours
                );
                AnalysisResult {
                    assigned_team: recommendation.team,
                    confidence: recommendation
                        .confidence
                        .unwrap_or(self.advisory_confidence),
                    estimate: ResolutionEstimate::Hours(recommendation.estimated_hours),
                    source: AnalysisSource::Generative,
                    supporting_matches: partial_matches,
                    rationale: recommendation.rationale,
                    fallback_reasons: reasons,
                }
            }
            Err(err) => {
                warn!("fallback degraded (error={})", err);
                self.degraded(partial_matches, reasons, &err)
            }
        }
    }

    fn degraded(
        &self,
        partial_matches: Vec<SimilarityMatch>,
        reasons: Vec<FallbackReason>,
        err: &GenerationError,
    ) -> AnalysisResult {
        AnalysisResult {
            assigned_team: self.unassigned_team.clone(),
            confidence: 0.0,
            estimate: ResolutionEstimate::Unavailable,
            source: AnalysisSource::Generative,
            supporting_matches: partial_matches,
            rationale: Some(format!("generative fallback unavailable: {err}")),
            fallback_reasons: reasons,
        }
    }
}
