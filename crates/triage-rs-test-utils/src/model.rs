use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use triage_rs_core::{GenerationError, GenerativeModel, Prompt};

/// Always answers with the same text.
#[derive(Debug, Clone)]
pub struct FixedModel {
    response: String,
}

impl FixedModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    /// A well-formed recommendation for `team`.
    pub fn recommending(team: &str, hours: f64) -> Self {
        Self::new(format!(
            "{{\"assigned_team\": \"{team}\", \"reason\": \"matched responsibilities\", \"estimated_resolution_hours\": {hours}}}"
        ))
    }
}

#[async_trait]
impl GenerativeModel for FixedModel {
    async fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        Ok(self.response.clone())
    }
}

/// Always fails with the given error.
#[derive(Debug, Clone)]
pub struct FailingModel {
    error: GenerationError,
}

impl FailingModel {
    pub fn new(error: GenerationError) -> Self {
        Self { error }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GenerationError::Transport(message.into()))
    }
}

#[async_trait]
impl GenerativeModel for FailingModel {
    async fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        Err(self.error.clone())
    }
}

/// Answers only after `delay`; pair with paused tokio time.
#[derive(Debug, Clone)]
pub struct SlowModel {
    delay: Duration,
    response: String,
}

impl SlowModel {
    pub fn new(delay: Duration, response: impl Into<String>) -> Self {
        Self {
            delay,
            response: response.into(),
        }
    }
}

#[async_trait]
impl GenerativeModel for SlowModel {
    async fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// Records every prompt it receives.
#[derive(Debug, Clone)]
pub struct RecordingModel {
    response: String,
    prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl RecordingModel {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerativeModel for RecordingModel {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        self.prompts.lock().push(prompt.clone());
        Ok(self.response.clone())
    }
}
