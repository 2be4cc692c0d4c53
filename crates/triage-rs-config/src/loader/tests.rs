//! Tests for layered configuration loading.

use super::*;
use crate::{EmbeddingProviderKind, WeightingScheme};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Build a project root with a `.git` marker and a nested cwd.
fn project_layout(root: &Path) -> (PathBuf, PathBuf) {
    let project_root = root.join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("subdir");
    fs::create_dir_all(&cwd).expect("cwd");
    (project_root, cwd)
}

#[test]
fn parse_minimal_config() {
    let config = TriageConfig::load_from_str("{}").expect("config");
    assert_eq!(config, TriageConfig::default());
}

#[test]
fn parse_json5_with_comments_and_enums() {
    let json5 = r#"{
        // tuned for a small corpus
        retrieval: { top_k: 5 },
        decision: { confidence_threshold: 0.6, weighting: "exponential" },
        embedding: { provider: "http", dimension: 1536, model: "text-embedding-3-small" },
    }"#;
    let config = TriageConfig::load_from_str(json5).expect("config");
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.decision.confidence_threshold, 0.6);
    assert_eq!(config.decision.weighting, WeightingScheme::Exponential);
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Http);
    assert_eq!(config.embedding.dimension, 1536);
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = TriageConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("unknown key"));
    assert!(msg.contains("config:unexpected"));
}

#[test]
fn rejects_unknown_nested_key_with_path() {
    let err = TriageConfig::load_from_str(r#"{ retrieval: { foo: 1 } }"#).unwrap_err();
    assert_eq!(
        format!("{err}"),
        "config:retrieval.foo: unknown key"
    );
}

#[test]
fn rejects_invalid_weighting() {
    let err = TriageConfig::load_from_str(r#"{ decision: { weighting: "linear" } }"#).unwrap_err();
    assert!(format!("{err}").contains("decision.weighting"));
}

#[test]
fn rejects_threshold_out_of_range() {
    let err =
        TriageConfig::load_from_str(r#"{ decision: { confidence_threshold: 1.5 } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn rejects_zero_timeout() {
    let err = TriageConfig::load_from_str(r#"{ fallback: { timeout_ms: 0 } }"#).unwrap_err();
    assert!(format!("{err}").contains("timeout_ms"));
}

#[test]
fn rejects_team_without_name() {
    let err = TriageConfig::load_from_str(
        r#"{ fallback: { teams: [{ responsibilities: "everything" }] } }"#,
    )
    .unwrap_err();
    assert!(format!("{err}").contains("fallback.teams[0].name"));
}

#[test]
fn enabled_ledger_requires_path() {
    let err = TriageConfig::load_from_str(r#"{ ledger: { enabled: true } }"#).unwrap_err();
    assert!(format!("{err}").contains("ledger.path"));
}

#[test]
fn layered_config_prefers_cwd_over_project() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let (project_root, cwd) = project_layout(root);

    let system_config = root.join("system.json5");
    write_json5(&system_config, "{ fallback: { unassigned_team: \"system\" } }");
    let user_config = root.join("user.json5");
    write_json5(&user_config, "{ fallback: { unassigned_team: \"user\" } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ fallback: { unassigned_team: \"project\" } }",
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        "{ fallback: { unassigned_team: \"cwd\" } }",
    );

    let mut options = LayeredConfigOptions::new(&cwd);
    options.system_config_path = Some(system_config);
    options.user_config_path = Some(user_config);

    let layered = TriageConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.fallback.unassigned_team, "cwd");
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
        ]
    );
}

#[test]
fn runtime_override_wins_and_sibling_keys_survive() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let (_project_root, cwd) = project_layout(root);

    let system_config = root.join("system.json5");
    write_json5(
        &system_config,
        "{ decision: { confidence_threshold: 0.4, weighting: \"exponential\" } }",
    );
    let runtime_config = root.join("runtime.json5");
    write_json5(&runtime_config, "{ decision: { confidence_threshold: 0.8 } }");

    let mut options = LayeredConfigOptions::new(&cwd).with_runtime_path(&runtime_config);
    options.system_config_path = Some(system_config);
    options.user_config_path = None;

    let layered = TriageConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.decision.confidence_threshold, 0.8);
    assert_eq!(layered.config.decision.weighting, WeightingScheme::Exponential);
}

#[test]
fn project_root_equal_to_cwd_loads_once() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let (project_root, _cwd) = project_layout(root);
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ retrieval: { top_k: 7 } }",
    );

    let mut options = LayeredConfigOptions::new(&project_root);
    options.system_config_path = None;
    options.user_config_path = None;

    let layered = TriageConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.retrieval.top_k, 7);
    assert_eq!(layered.layers.len(), 1);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let mut options =
        LayeredConfigOptions::new(temp.path()).with_runtime_path(temp.path().join("absent.json5"));
    options.system_config_path = None;
    options.user_config_path = None;

    let err = TriageConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

#[test]
fn schema_errors_name_the_offending_layer() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let user_config = root.join("user.json5");
    write_json5(&user_config, "{ conversation: { max_turns: -1 } }");

    let mut options = LayeredConfigOptions::new(root);
    options.system_config_path = None;
    options.user_config_path = Some(user_config);

    let err = TriageConfig::load_layered_with_options(options).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("user("));
    assert!(msg.contains("conversation.max_turns"));
}
