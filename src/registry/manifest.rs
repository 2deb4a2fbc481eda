//! On-disk manifests describing external-process modules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use super::PluginCandidate;
use crate::config::ProcessConfig;
use crate::error::DiscoveryError;
use crate::modules::ProcessModule;
use crate::process::Supervision;

/// `*.toml` files of every directory, each directory sorted by file name.
///
/// Unreadable directories are skipped with a warning.
pub(crate) fn manifest_paths(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read plugin directory");
                continue;
            }
        };
        let mut found: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        out.extend(found);
    }
    out
}

/// Reads one manifest into a candidate backed by a [`ProcessModule`].
pub(crate) fn load(path: &Path, supervision: Supervision) -> Result<PluginCandidate, DiscoveryError> {
    let manifest_error = |error: String| DiscoveryError::Manifest {
        path: path.display().to_string(),
        error,
    };

    let text = std::fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    let table: toml::Table = text.parse().map_err(|e: toml::de::Error| manifest_error(e.to_string()))?;

    let process: ProcessConfig = table
        .get("process")
        .cloned()
        .ok_or_else(|| manifest_error("missing [process] table".into()))?
        .try_into()
        .map_err(|e: toml::de::Error| manifest_error(e.to_string()))?;

    Ok(PluginCandidate {
        source: path.display().to_string(),
        iid: table.get("iid").and_then(toml::Value::as_str).map(str::to_string),
        metadata: table.get("metadata").and_then(toml::Value::as_table).cloned(),
        instance: Arc::new(ProcessModule::new(process, supervision)),
    })
}
