use std::path::{Path, PathBuf};

use serde::Deserialize;

/// `[sinks]` section: where alerts and rule exports go.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    pub alerts: String,
    pub exports: String,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            alerts: "stdout".to_string(),
            exports: "stdout".to_string(),
        }
    }
}

/// A parsed sink destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUri {
    /// `file://<path>`; JSON lines appended to the file.
    File(PathBuf),
    /// `stdout`
    Stdout,
}

impl SinkUri {
    /// Resolve a relative file path against `base_dir`.
    pub fn resolve(self, base_dir: &Path) -> SinkUri {
        match self {
            SinkUri::File(p) if p.is_relative() => SinkUri::File(base_dir.join(p)),
            other => other,
        }
    }
}

pub fn parse_sink_uri(uri: &str) -> anyhow::Result<SinkUri> {
    let uri = uri.trim();
    if uri == "stdout" || uri == "stdout://" {
        return Ok(SinkUri::Stdout);
    }
    match uri.strip_prefix("file://") {
        Some("") => anyhow::bail!("file sink URI has no path: {uri:?}"),
        Some(path) => Ok(SinkUri::File(PathBuf::from(path))),
        None => anyhow::bail!("unsupported sink URI {uri:?} (expected file://<path> or stdout)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_schemes() {
        assert_eq!(parse_sink_uri("stdout").unwrap(), SinkUri::Stdout);
        assert_eq!(
            parse_sink_uri("file://out/alerts.jsonl").unwrap(),
            SinkUri::File(PathBuf::from("out/alerts.jsonl"))
        );
        assert_eq!(
            parse_sink_uri("file:///var/log/alerts.jsonl").unwrap(),
            SinkUri::File(PathBuf::from("/var/log/alerts.jsonl"))
        );
    }

    #[test]
    fn rejects_unknown_or_empty() {
        assert!(parse_sink_uri("kafka://alerts").is_err());
        assert!(parse_sink_uri("file://").is_err());
    }

    #[test]
    fn resolves_relative_paths() {
        let uri = parse_sink_uri("file://out/a.jsonl").unwrap();
        assert_eq!(
            uri.resolve(Path::new("/etc/fw")),
            SinkUri::File(PathBuf::from("/etc/fw/out/a.jsonl"))
        );
        let abs = parse_sink_uri("file:///tmp/a.jsonl").unwrap();
        assert_eq!(
            abs.resolve(Path::new("/etc/fw")),
            SinkUri::File(PathBuf::from("/tmp/a.jsonl"))
        );
    }
}
