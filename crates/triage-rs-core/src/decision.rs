//! Decision engine: weighted team vote, weighted resolution estimate, and the
//! policy deciding whether historical evidence is trustworthy.
//!
//! Everything here is a pure function of the ranked matches and the
//! configured threshold/weighting.

use log::debug;
use serde::{Deserialize, Serialize};
use triage_rs_config::{DecisionConfig, WeightingScheme};
use triage_rs_protocol::{
    AnalysisResult, AnalysisSource, FallbackReason, ResolutionEstimate, SimilarityMatch,
};

/// Vote weight for a match at `distance`. Monotonically decreasing, in `(0, 1]`.
pub fn vote_weight(distance: f64, weighting: WeightingScheme) -> f64 {
    let distance = distance.max(0.0);
    match weighting {
        WeightingScheme::InverseDistance => 1.0 / (1.0 + distance),
        WeightingScheme::Exponential => (-distance).exp(),
    }
}

/// Summed vote of one team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamVote {
    pub team: String,
    pub weight: f64,
    /// Position of the team's closest match in the ranked input.
    pub best_position: usize,
}

/// Full tally and verdict for one set of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Votes ordered winner first.
    pub votes: Vec<TeamVote>,
    /// Sum of every match weight.
    pub total_weight: f64,
    pub confidence: f64,
    pub estimate: ResolutionEstimate,
    /// Empty when the historical result can be trusted.
    pub fallback_reasons: Vec<FallbackReason>,
}

impl Decision {
    pub fn winner(&self) -> Option<&TeamVote> {
        self.votes.first()
    }

    pub fn needs_fallback(&self) -> bool {
        !self.fallback_reasons.is_empty()
    }
}

/// What the analyzer should do with a set of matches.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Corpus evidence is sufficient.
    Trusted(AnalysisResult),
    /// Defer to the generative fallback.
    Insufficient {
        reasons: Vec<FallbackReason>,
        matches: Vec<SimilarityMatch>,
    },
}

/// Weighted-vote decision engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionEngine {
    confidence_threshold: f64,
    weighting: WeightingScheme,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::from_config(&DecisionConfig::default())
    }
}

impl DecisionEngine {
    pub fn new(confidence_threshold: f64, weighting: WeightingScheme) -> Self {
        Self {
            confidence_threshold,
            weighting,
        }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(config.confidence_threshold, config.weighting)
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Sum weights per team, winner first.
    ///
    /// Equal totals go to the team whose closest match ranks first.
    pub fn tally(&self, matches: &[SimilarityMatch]) -> Vec<TeamVote> {
        let mut votes: Vec<TeamVote> = Vec::new();
        for (position, entry) in matches.iter().enumerate() {
            let weight = vote_weight(entry.distance, self.weighting);
            match votes.iter_mut().find(|vote| vote.team == entry.ticket.team) {
                Some(vote) => {
                    vote.weight += weight;
                    vote.best_position = vote.best_position.min(position);
                }
                None => votes.push(TeamVote {
                    team: entry.ticket.team.clone(),
                    weight,
                    best_position: position,
                }),
            }
        }
        votes.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.best_position.cmp(&b.best_position))
        });
        votes
    }

    /// Weighted mean duration over matches with both timestamps.
    pub fn estimate(&self, matches: &[SimilarityMatch]) -> ResolutionEstimate {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut min_hours = f64::INFINITY;
        let mut max_hours = f64::NEG_INFINITY;
        for entry in matches {
            let Some(hours) = entry.ticket.resolution_hours() else {
                continue;
            };
            let weight = vote_weight(entry.distance, self.weighting);
            weighted_sum += weight * hours;
            weight_sum += weight;
            min_hours = min_hours.min(hours);
            max_hours = max_hours.max(hours);
        }
        if weight_sum <= 0.0 {
            return ResolutionEstimate::Unavailable;
        }
        // Rounding must not push the mean outside the contributing range.
        ResolutionEstimate::Hours((weighted_sum / weight_sum).clamp(min_hours, max_hours))
    }

    /// Tally, estimate, and evaluate the fallback policy.
    pub fn decide(&self, matches: &[SimilarityMatch]) -> Decision {
        let votes = self.tally(matches);
        let total_weight: f64 = votes.iter().map(|vote| vote.weight).sum();
        let confidence = match votes.first() {
            Some(winner) if total_weight > 0.0 => (winner.weight / total_weight).clamp(0.0, 1.0),
            _ => 0.0,
        };
        let estimate = self.estimate(matches);

        let mut fallback_reasons = Vec::new();
        if matches.is_empty() {
            fallback_reasons.push(FallbackReason::NoMatches);
        } else if confidence < self.confidence_threshold {
            fallback_reasons.push(FallbackReason::LowConfidence {
                confidence,
                threshold: self.confidence_threshold,
            });
        }
        if !estimate.is_available() {
            fallback_reasons.push(FallbackReason::NoResolutionData);
        }

        debug!(
            "decision computed (matches={}, teams={}, confidence={:.3}, fallback={})",
            matches.len(),
            votes.len(),
            confidence,
            !fallback_reasons.is_empty()
        );
        Decision {
            votes,
            total_weight,
            confidence,
            estimate,
            fallback_reasons,
        }
    }

    /// Decide and package the outcome, keeping the matches either way.
    pub fn evaluate(&self, matches: Vec<SimilarityMatch>) -> Verdict {
        let decision = self.decide(&matches);
        let trusted_team = if decision.needs_fallback() {
            None
        } else {
            decision.winner().map(|winner| winner.team.clone())
        };
        match trusted_team {
            Some(assigned_team) => Verdict::Trusted(AnalysisResult {
                assigned_team,
                confidence: decision.confidence,
                estimate: decision.estimate,
                source: AnalysisSource::Historical,
                supporting_matches: matches,
                rationale: None,
                fallback_reasons: Vec::new(),
            }),
            None => Verdict::Insufficient {
                reasons: decision.fallback_reasons,
                matches,
            },
        }
    }
}
