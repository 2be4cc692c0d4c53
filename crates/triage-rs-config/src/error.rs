use thiserror::Error;

/// Failure while reading, decoding, or checking a `triage.json5` layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file could not be read: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("config is not valid JSON5: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The document parsed but does not match `TriageConfig`.
    #[error("config does not match the expected shape: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// Schema violation at a dotted path such as `decision.weighting`.
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },
    /// Range or cross-field check on the merged config.
    #[error("config rejected: {0}")]
    Invalid(String),
}
