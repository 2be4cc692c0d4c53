//! Issue summarizer: condenses a free-form issue into a one-line summary plus
//! sentiment, priority, and a suggested solution.

use crate::error::GenerationError;
use crate::generation::{GenerativeModel, Prompt, extract_json_object};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are an expert in summarizing technical support conversations. \
You judge the customer's sentiment and the priority of the issue, and you suggest a short, \
practical solution.";

/// Structured summary of one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    /// One sentence, under 15 words.
    pub summary: String,
    /// Urgent, Confused, Annoyed, Anxious, or Happy.
    pub sentiment: String,
    /// Critical, High, Medium, or Low.
    pub priority: String,
    pub solution: String,
}

/// Wraps a generative model to produce [`IssueSummary`] values.
#[derive(Clone)]
pub struct IssueSummarizer {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl IssueSummarizer {
    pub fn new(model: Arc<dyn GenerativeModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn build_prompt(text: &str) -> Prompt {
        let user = format!(
            "Given the conversation below, do the following:\n\
             1. Summarize the issue in one sentence (under 15 words).\n\
             2. Detect the customer's sentiment (Urgent / Confused / Annoyed / Anxious / Happy).\n\
             3. Set a priority level (Critical / High / Medium / Low).\n\
             4. Recommend a proper solution for the issue in under 100 words.\n\n\
             Return a JSON object with the keys summary, sentiment, priority, and solution.\n\
             Conversation: {}\n\
             Do not include any other text in your response.",
            text.trim()
        );
        Prompt::new(SYSTEM_PROMPT, user)
    }

    /// Summarize `text`; `None` on any model or parsing failure.
    pub async fn summarize(&self, text: &str) -> Option<IssueSummary> {
        match self.try_summarize(text).await {
            Ok(summary) => {
                debug!(
                    "summarized issue (priority={}, sentiment={})",
                    summary.priority, summary.sentiment
                );
                Some(summary)
            }
            Err(err) => {
                warn!("summarization failed (error={})", err);
                None
            }
        }
    }

    async fn try_summarize(&self, text: &str) -> Result<IssueSummary, GenerationError> {
        let prompt = Self::build_prompt(text);
        let raw = tokio::time::timeout(self.timeout, self.model.generate(&prompt))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;
        parse_summary(&raw)
    }
}

/// Parse an [`IssueSummary`] from raw model output.
pub fn parse_summary(text: &str) -> Result<IssueSummary, GenerationError> {
    let object = extract_json_object(text)?;
    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(|value| value.trim().to_string())
            .unwrap_or_default()
    };
    let summary = field("summary");
    if summary.is_empty() {
        return Err(GenerationError::Parse("missing summary".to_string()));
    }
    let priority = field("priority");
    Ok(IssueSummary {
        summary,
        sentiment: field("sentiment"),
        priority: if priority.is_empty() {
            "Medium".to_string()
        } else {
            priority
        },
        solution: field("solution"),
    })
}
