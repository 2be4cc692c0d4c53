//! Configuration schema for triage.

use serde::{Deserialize, Serialize};

/// Root config for the triage SDK.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TriageConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl TriageConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> TriageConfigBuilder {
        TriageConfigBuilder::new()
    }
}

/// Builder for assembling a `TriageConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct TriageConfigBuilder {
    config: TriageConfig,
}

impl TriageConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: TriageConfig::default(),
        }
    }

    /// Replace the retrieval configuration.
    pub fn retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.config.retrieval = retrieval;
        self
    }

    /// Replace the decision configuration.
    pub fn decision(mut self, decision: DecisionConfig) -> Self {
        self.config.decision = decision;
        self
    }

    /// Replace the fallback configuration.
    pub fn fallback(mut self, fallback: FallbackConfig) -> Self {
        self.config.fallback = fallback;
        self
    }

    /// Replace the conversation retention configuration.
    pub fn conversation(mut self, conversation: ConversationConfig) -> Self {
        self.config.conversation = conversation;
        self
    }

    /// Replace the embedding provider configuration.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the generation provider configuration.
    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.config.generation = generation;
        self
    }

    /// Replace the ticket ledger configuration.
    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.config.ledger = ledger;
        self
    }

    /// Finalize and return the built `TriageConfig`.
    pub fn build(self) -> TriageConfig {
        self.config
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Neighbours requested when the caller does not pass `k`.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Upper bound for caller-supplied `k`.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Prefix follow-up queries with the last unresolved turn.
    #[serde(default = "default_true")]
    pub augment_with_history: bool,
    /// Embed a model-written summary instead of the raw query.
    #[serde(default)]
    pub summarize_query: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            augment_with_history: true,
            summarize_query: false,
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_max_top_k() -> usize {
    50
}

fn default_true() -> bool {
    true
}

/// Vote weighting function applied to match distances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightingScheme {
    /// `w = 1 / (1 + d)`.
    #[default]
    InverseDistance,
    /// `w = exp(-d)`.
    Exponential,
}

/// Decision engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionConfig {
    /// Results with confidence strictly below this value fall back.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub weighting: WeightingScheme,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            weighting: WeightingScheme::default(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.5
}

/// A team the generative fallback may assign issues to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamProfile {
    pub name: String,
    #[serde(default)]
    pub responsibilities: String,
}

impl TeamProfile {
    pub fn new(name: impl Into<String>, responsibilities: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responsibilities: responsibilities.into(),
        }
    }
}

/// Generative fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    /// Deadline for one generative call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Confidence reported for generative results without a model-reported value.
    #[serde(default)]
    pub advisory_confidence: f64,
    /// Team name used when the generative call fails.
    #[serde(default = "default_unassigned_team")]
    pub unassigned_team: String,
    /// Conversation turns included in the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Weak historical matches included in the prompt.
    #[serde(default = "default_max_context_matches")]
    pub max_context_matches: usize,
    #[serde(default = "default_teams")]
    pub teams: Vec<TeamProfile>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            advisory_confidence: 0.0,
            unassigned_team: default_unassigned_team(),
            history_window: default_history_window(),
            max_context_matches: default_max_context_matches(),
            teams: default_teams(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_unassigned_team() -> String {
    "Unassigned".to_string()
}

fn default_history_window() -> usize {
    3
}

fn default_max_context_matches() -> usize {
    3
}

fn default_teams() -> Vec<TeamProfile> {
    vec![
        TeamProfile::new(
            "Software",
            "App crashes, installation errors, update failures, feature malfunctions",
        ),
        TeamProfile::new(
            "Network",
            "Internet connectivity, API endpoints, DNS issues, VPN conflicts",
        ),
        TeamProfile::new(
            "Device",
            "Hardware compatibility, thermostat issues, overheating, Bluetooth connectivity",
        ),
        TeamProfile::new(
            "Account",
            "Login issues, data syncing across devices, profile management, authentication",
        ),
        TeamProfile::new(
            "Payments",
            "Transaction failures, subscription renewal issues, payment gateway integration",
        ),
    ]
}

/// Per-session conversation retention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Turns kept per session; `0` keeps everything.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    20
}

/// Embedding provider backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Local feature-hashing embedding.
    #[default]
    Hashed,
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            dimension: default_dimension(),
            model: None,
            base_url: None,
            api_key_env: None,
        }
    }
}

fn default_dimension() -> usize {
    384
}

/// Generative model backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationProviderKind {
    /// OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    Http,
    /// No generative model; every fallback degrades.
    None,
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: GenerationProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::default(),
            model: None,
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

/// Live ticket ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// JSONL file backing the ledger.
    #[serde(default)]
    pub path: Option<String>,
}
