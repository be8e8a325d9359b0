#[macro_use]
mod log_macros;

mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod metrics;
mod sink_task;
mod source;
mod tick_task;
pub mod tracing_init;
mod worker;

pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use lifecycle::{Engine, wait_for_signal};
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
