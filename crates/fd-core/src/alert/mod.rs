mod sink;
mod types;

pub use sink::{AlertSink, ExportSink, FanOutSink, FileSink, MemorySink, StdoutSink};
pub use types::{Alert, AlertOrigin, RuleExport};
pub(crate) use types::now_rfc3339;
