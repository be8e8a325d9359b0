pub mod config;
pub mod logging;
pub mod runtime;
pub mod sink;
pub mod source;
pub mod types;
mod validate;

pub use config::FraudConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use runtime::{EventConfig, RuntimeConfig};
pub use sink::{SinkUri, SinksConfig, parse_sink_uri};
pub use source::{SourcesConfig, resolve_paths};
pub use types::{HumanDuration, TimeMode};
