//! Generative model boundary: prompt type, trait, HTTP client, response parsing.

use crate::error::GenerationError;
use async_trait::async_trait;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::OnceLock;

/// A system/user prompt pair sent to a generative model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Text generation capability used by the fallback advisor and summarizer.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Return the raw model output for a prompt.
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Maximum number of bytes from an HTTP error body kept in errors.
const MAX_ERROR_BODY_LEN: usize = 200;

/// OpenAI-compatible `POST {base_url}/chat/completions` client.
#[derive(Debug, Clone)]
pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpChatModel {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn build_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        })
    }
}

#[async_trait]
impl GenerativeModel for HttpChatModel {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "requesting completion (model={}, prompt_len={})",
            self.model,
            prompt.user.len()
        );
        let mut request = self.client.post(&url).json(&self.build_body(prompt));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(unreadable body)".to_string());
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_LEN).collect(),
            });
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::Parse("response is missing choices[0].message.content".to_string())
            })
    }
}

/// Structured team/estimate recommendation parsed from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub team: String,
    pub estimated_hours: f64,
    pub rationale: Option<String>,
    /// Model-reported confidence, kept only when it lies in `[0, 1]`.
    pub confidence: Option<f64>,
}

fn fenced_json() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

/// First balanced `{...}` span, ignoring braces inside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pull a JSON object out of free-form model output.
///
/// A fenced ```json block wins; otherwise the first balanced object is used.
pub fn extract_json_object(text: &str) -> Result<Value, GenerationError> {
    let candidate = fenced_json()
        .and_then(|fence| fence.captures(text))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .or_else(|| balanced_object(text))
        .ok_or_else(|| GenerationError::Parse("no JSON object in response".to_string()))?;
    let value: Value =
        serde_json::from_str(candidate).map_err(|err| GenerationError::Parse(err.to_string()))?;
    if !value.is_object() {
        return Err(GenerationError::Parse("expected a JSON object".to_string()));
    }
    Ok(value)
}

fn first_str<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|text| !text.is_empty())
}

fn first_number(object: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        })
}

/// Parse a recommendation out of raw model output.
pub fn parse_recommendation(text: &str) -> Result<Recommendation, GenerationError> {
    let object = extract_json_object(text)?;
    let team = first_str(&object, &["assigned_team", "team"])
        .ok_or_else(|| GenerationError::Parse("missing assigned_team".to_string()))?;
    let estimated_hours = first_number(
        &object,
        &["estimated_resolution_hours", "estimated_hours"],
    )
    .ok_or_else(|| GenerationError::Parse("missing estimated_resolution_hours".to_string()))?;
    if !estimated_hours.is_finite() || estimated_hours < 0.0 {
        return Err(GenerationError::Parse(format!(
            "invalid estimated_resolution_hours: {estimated_hours}"
        )));
    }
    let confidence = first_number(&object, &["confidence"])
        .filter(|value| (0.0..=1.0).contains(value));
    Ok(Recommendation {
        team: team.to_string(),
        estimated_hours,
        rationale: first_str(&object, &["reason", "rationale"]).map(str::to_string),
        confidence,
    })
}
