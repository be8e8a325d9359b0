use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// `[logging]` section. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base filter level, e.g. `"info"`. `RUST_LOG` overrides it.
    pub level: String,
    /// Target-specific levels, e.g. `{ "fd_core::router" = "debug" }`.
    pub modules: BTreeMap<String, String>,
    /// Extra log file, relative to the config file's directory.
    pub file: Option<PathBuf>,
    pub format: LogFormat,
    /// Colour the stderr output in `plain` format.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            modules: BTreeMap::new(),
            file: None,
            format: LogFormat::Plain,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Filter directives: the base level followed by each module override.
    pub fn directives(&self) -> String {
        let mut parts = vec![self.level.clone()];
        parts.extend(
            self.modules
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        );
        parts.join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `[domain] message` lines.
    Plain,
    /// One JSON object per line.
    Json,
}
