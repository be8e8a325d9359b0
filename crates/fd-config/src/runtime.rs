use serde::{Deserialize, Serialize};

use crate::types::{HumanDuration, TimeMode};

/// `[runtime]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of partition workers owning disjoint key ranges.
    pub partitions: usize,
    /// Bound of every inter-task channel.
    pub channel_capacity: usize,
    /// How often window timers are checked between events.
    pub tick_interval: HumanDuration,
    pub time_mode: TimeMode,
    /// Window length for rules without `windowSize`.
    pub default_window: HumanDuration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            channel_capacity: 1024,
            tick_interval: HumanDuration::from(std::time::Duration::from_secs(1)),
            time_mode: TimeMode::Event,
            default_window: HumanDuration::from(std::time::Duration::from_secs(86_400)),
        }
    }
}

/// `[event]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventConfig {
    /// Dotted path of the event timestamp (epoch ms or datetime string).
    pub timestamp_field: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            timestamp_field: "timestamp".to_string(),
        }
    }
}
