//! Layered loading of `triage.json5`.
//!
//! Layers are read lowest precedence first: system, user, project root, cwd,
//! then any runtime files. Each one is schema-checked on its own before the
//! merged document is decoded into a [`TriageConfig`].

mod layer_io;
mod merge;
mod schema;
mod utils;

#[cfg(test)]
mod tests;

use crate::{ConfigError, TriageConfig};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "triage.json5";
/// Directory under `$HOME` holding the user layer.
const DEFAULT_CONFIG_DIR: &str = ".triage";
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: Option<&str> = Some("/etc/triage/triage.json5");
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: Option<&str> = Some("C:\\ProgramData\\triage\\triage.json5");
#[cfg(not(any(unix, windows)))]
const SYSTEM_CONFIG_PATH: Option<&str> = None;

/// Result of [`TriageConfig::load_layered`].
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: TriageConfig,
    /// Files that were found and merged, lowest precedence first.
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    System,
    User,
    /// Nearest ancestor of the cwd containing a root marker.
    Project,
    Cwd,
    /// Explicit files passed through [`LayeredConfigOptions::with_runtime_path`].
    Runtime,
}

#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Locations searched by [`TriageConfig::load_layered_with_options`].
///
/// `None` for the system or user path skips that layer entirely.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    /// Must exist; a missing runtime file is a read error.
    pub runtime_paths: Vec<PathBuf>,
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .copied()
                .map(String::from)
                .collect(),
        }
    }

    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().into());
        self
    }

    /// Candidate locations for the discovered layers, in precedence order.
    fn discovered_paths(&self, cwd: &Path) -> Vec<(ConfigLayerSource, PathBuf)> {
        let project = utils::find_project_root(cwd, &self.project_root_markers)
            .map(|root| root.join(DEFAULT_CONFIG_FILE));
        [
            (ConfigLayerSource::System, self.system_config_path.clone()),
            (ConfigLayerSource::User, self.user_config_path.clone()),
            (ConfigLayerSource::Project, project),
            (ConfigLayerSource::Cwd, Some(cwd.join(DEFAULT_CONFIG_FILE))),
        ]
        .into_iter()
        .filter_map(|(source, path)| path.map(|path| (source, path)))
        .collect()
    }
}

impl TriageConfig {
    /// Read one file as a complete config, without layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("reading standalone config (path={})", path.display());
        config_from_value(layer_io::read_json5(path)?, "config")
    }

    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("parsing inline config (bytes={})", contents.len());
        config_from_value(json5::from_str(contents)?, "config")
    }

    /// [`Self::load_layered_with_options`] with the default locations for `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        debug!("resolving config layers (cwd={})", cwd.display());

        let mut found = Vec::new();
        let mut visited = HashSet::new();
        for (source, path) in options.discovered_paths(&cwd) {
            // The project root and cwd often coincide.
            if path.exists() && !visited.insert(utils::unique_path(&path)) {
                debug!(
                    "layer already read (source={}, path={})",
                    source.as_str(),
                    path.display()
                );
                continue;
            }
            found.extend(layer_io::load_optional_layer(source, &path)?);
        }
        for path in &options.runtime_paths {
            found.push(layer_io::load_required_layer(ConfigLayerSource::Runtime, path)?);
        }

        let mut merged = Value::Object(Map::new());
        for layer in &found {
            merge::merge_json_values(&mut merged, &layer.value);
        }
        let config = config_from_value(merged, "effective")?;
        let layers: Vec<ConfigLayer> = found.into_iter().map(|layer| layer.meta).collect();
        info!("config ready (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Range and cross-field checks on a decoded config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.decision.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "decision.confidence_threshold must be within [0, 1] (got {threshold})"
            )));
        }
        let advisory = self.fallback.advisory_confidence;
        if !(0.0..=1.0).contains(&advisory) {
            return Err(ConfigError::Invalid(format!(
                "fallback.advisory_confidence must be within [0, 1] (got {advisory})"
            )));
        }
        if self.fallback.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fallback.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.top_k must be greater than zero".to_string(),
            ));
        }
        if self.retrieval.top_k > self.retrieval.max_top_k {
            return Err(ConfigError::Invalid(format!(
                "retrieval.top_k ({}) exceeds retrieval.max_top_k ({})",
                self.retrieval.top_k, self.retrieval.max_top_k
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be greater than zero".to_string(),
            ));
        }
        if self.fallback.unassigned_team.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fallback.unassigned_team must not be empty".to_string(),
            ));
        }
        if self.ledger.enabled && self.ledger.path.is_none() {
            return Err(ConfigError::Invalid(
                "ledger.path is required when the ledger is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<TriageConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: TriageConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
