use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::LoggingConfig;
use crate::runtime::{EventConfig, RuntimeConfig};
use crate::sink::SinksConfig;
use crate::source::SourcesConfig;
use crate::validate;

// ---------------------------------------------------------------------------
// FraudConfig
// ---------------------------------------------------------------------------

/// Parsed and validated `fraudwatch.toml`. Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FraudConfig {
    pub runtime: RuntimeConfig,
    pub event: EventConfig,
    pub sources: SourcesConfig,
    pub sinks: SinksConfig,
    pub logging: LoggingConfig,
}

impl FraudConfig {
    /// Read and parse a `fraudwatch.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for FraudConfig {
    type Err = anyhow::Error;

    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: FraudConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
