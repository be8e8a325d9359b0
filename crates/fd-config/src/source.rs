use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// `[sources]` section: JSON-lines inputs. Rule files are applied before
/// any event is read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// File or glob of rule mutation files.
    pub rules: Option<String>,
    /// File or glob of event files.
    pub events: Option<String>,
}

/// Expand a file name or glob relative to `base_dir`, sorted by path.
/// A plain path must exist; a glob may match nothing.
pub fn resolve_paths(pattern: &str, base_dir: &Path) -> Result<Vec<PathBuf>> {
    if pattern.contains(|c: char| matches!(c, '*' | '?' | '[')) {
        let full = base_dir.join(pattern);
        let full = full.to_string_lossy();
        let mut paths = glob::glob(&full)
            .with_context(|| format!("invalid glob pattern {pattern:?}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("reading matches of {pattern:?}"))?;
        paths.sort();
        Ok(paths)
    } else {
        let path = base_dir.join(pattern);
        if !path.exists() {
            anyhow::bail!("source file not found: {}", path.display());
        }
        Ok(vec![path])
    }
}
