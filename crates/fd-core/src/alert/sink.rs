use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use serde::Serialize;

use super::{Alert, RuleExport};

/// Trait for alert output destinations.
pub trait AlertSink: Send + Sync {
    fn send(&self, alert: &Alert) -> Result<()>;
}

/// Trait for rule-export destinations.
pub trait ExportSink: Send + Sync {
    fn export(&self, export: &RuleExport) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// Appends payloads as JSON Lines to a file.
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line<T: Serialize>(&self, payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        let mut w = self
            .writer
            .lock()
            .map_err(|_| anyhow!("file sink lock poisoned"))?;
        w.write_all(json.as_bytes())?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}

impl AlertSink for FileSink {
    fn send(&self, alert: &Alert) -> Result<()> {
        self.write_line(alert)
    }
}

impl ExportSink for FileSink {
    fn export(&self, export: &RuleExport) -> Result<()> {
        self.write_line(export)
    }
}

// ---------------------------------------------------------------------------
// Stdout
// ---------------------------------------------------------------------------

/// Prints payloads as JSON Lines on stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    fn write_line<T: Serialize>(payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{json}")?;
        out.flush()?;
        Ok(())
    }
}

impl AlertSink for StdoutSink {
    fn send(&self, alert: &Alert) -> Result<()> {
        Self::write_line(alert)
    }
}

impl ExportSink for StdoutSink {
    fn export(&self, export: &RuleExport) -> Result<()> {
        Self::write_line(export)
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Broadcasts alerts to multiple sinks.
///
/// Continues sending to all sinks even if one fails. Returns the first error
/// encountered, if any.
pub struct FanOutSink {
    sinks: Vec<Box<dyn AlertSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        Self { sinks }
    }
}

impl AlertSink for FanOutSink {
    fn send(&self, alert: &Alert) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        for sink in &self.sinks {
            if let Err(e) = sink.send(alert) {
                log::warn!("alert sink error: {e}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Collects everything it receives. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    alerts: Mutex<Vec<Alert>>,
    exports: Mutex<Vec<RuleExport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn exports(&self) -> Vec<RuleExport> {
        self.exports.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AlertSink for MemorySink {
    fn send(&self, alert: &Alert) -> Result<()> {
        self.alerts
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push(alert.clone());
        Ok(())
    }
}

impl ExportSink for MemorySink {
    fn export(&self, export: &RuleExport) -> Result<()> {
        self.exports
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push(export.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
