pub mod aggregate;
pub mod alert;
pub mod error;
pub mod eval;
pub mod event;
pub mod pipeline;
pub mod router;
pub mod rule;
pub mod store;
pub mod value;

pub use aggregate::{AggregateState, AggregationEngine, EngineStats};
pub use alert::{Alert, AlertOrigin, AlertSink, ExportSink, RuleExport};
pub use error::{CoreError, CoreReason, CoreResult};
pub use event::Event;
pub use pipeline::Pipeline;
pub use router::{KeyTuple, Routed, Router, partition_of};
pub use rule::{Rule, RuleId, RuleRecord, RuleState};
pub use store::{RuleSnapshot, RuleStore, StoreEffect};
pub use value::Value;
