//! Path helpers for the config loader.

use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Canonicalize when possible; a missing path is returned unchanged.
pub(super) fn normalize_path(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(ConfigError::ReadFailed(err)),
    }
}

/// Stable path used for de-duplication.
pub(super) fn unique_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Walk ancestors to find a directory containing any marker entry.
pub(super) fn find_project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|ancestor| markers.iter().any(|marker| ancestor.join(marker).exists()))
        .map(Path::to_path_buf)
}
