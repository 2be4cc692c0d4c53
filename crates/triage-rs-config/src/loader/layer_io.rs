//! Reading individual config layers and resolving their default locations.

use super::{ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::path::{Path, PathBuf};

impl ConfigLayerSource {
    /// Short lowercase name used in log lines and error labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Project => "project",
            Self::Cwd => "cwd",
            Self::Runtime => "runtime",
        }
    }
}

/// Read a JSON5 document into a JSON value.
pub(super) fn read_json5(path: &Path) -> Result<Value, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(json5::from_str(&raw)?)
}

/// Like [`load_required_layer`], but an absent file yields `Ok(None)`.
pub(super) fn load_optional_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<Option<LoadedLayer>, ConfigError> {
    match path.try_exists() {
        Ok(true) => load_required_layer(source, path).map(Some),
        Ok(false) => {
            debug!(
                "no config at layer location (source={}, path={})",
                source.as_str(),
                path.display()
            );
            Ok(None)
        }
        Err(err) => Err(ConfigError::ReadFailed(err)),
    }
}

/// Read one layer and check it against the partial-layer schema.
pub(super) fn load_required_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    debug!(
        "reading config layer (source={}, path={})",
        source.as_str(),
        path.display()
    );
    let value = read_json5(path)?;
    super::schema::validate_layer_schema(&value, &layer_label(source, path))?;
    let meta = ConfigLayer {
        source,
        path: path.to_path_buf(),
    };
    Ok(LoadedLayer { meta, value })
}

/// `source(path)`, e.g. `cwd(/work/triage.json5)`.
pub(super) fn layer_label(source: ConfigLayerSource, path: &Path) -> String {
    format!("{}({})", source.as_str(), path.display())
}

pub(super) fn default_system_config_path() -> Option<PathBuf> {
    super::SYSTEM_CONFIG_PATH.map(PathBuf::from)
}

/// `~/.triage/triage.json5`, when a home directory can be resolved.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    let mut path = dirs.home_dir().join(DEFAULT_CONFIG_DIR);
    path.push(DEFAULT_CONFIG_FILE);
    Some(path)
}
