use serde::{Deserialize, Serialize};

pub type RuleId = i64;

/// Lifecycle state carried by a mutation record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleState {
    #[default]
    Active,
    Pause,
    Delete,
    Control,
}

impl RuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleState::Active => "ACTIVE",
            RuleState::Pause => "PAUSE",
            RuleState::Delete => "DELETE",
            RuleState::Control => "CONTROL",
        }
    }
}

/// Store-wide command; acted on only when the state is `CONTROL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    #[default]
    BroadcastRule,
    ClearStateAll,
    ClearStateAllStop,
    DeleteRulesAll,
    ExportRulesCurrent,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::BroadcastRule => "BROADCAST_RULE",
            Command::ClearStateAll => "CLEAR_STATE_ALL",
            Command::ClearStateAllStop => "CLEAR_STATE_ALL_STOP",
            Command::DeleteRulesAll => "DELETE_RULES_ALL",
            Command::ExportRulesCurrent => "EXPORT_RULES_CURRENT",
        }
    }
}

/// `{field, name, func}` as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggRecord {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub func: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneRecord {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub reserved: Vec<String>,
}

impl Default for PruneRecord {
    fn default() -> Self {
        Self {
            enabled: true,
            reserved: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Wire form of a rule mutation and of an exported rule.
///
/// Absent fields take their defaults; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    #[serde(default)]
    pub id: RuleId,
    #[serde(default)]
    pub state: RuleState,
    #[serde(default)]
    pub grouping_keys: Vec<String>,
    #[serde(default)]
    pub aggs: Vec<AggRecord>,
    #[serde(default)]
    pub limit: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub prune: PruneRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<i64>,
    #[serde(default)]
    pub command: Command,
}

impl RuleRecord {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// True when the record carries only an id and a state.
    pub fn is_bare(&self) -> bool {
        self.grouping_keys.is_empty()
            && self.aggs.is_empty()
            && self.limit.trim().is_empty()
            && self.filter.trim().is_empty()
            && self.window_size.is_none()
    }

    /// Definition equality, ignoring state and command.
    pub fn same_body(&self, other: &RuleRecord) -> bool {
        self.id == other.id
            && self.grouping_keys == other.grouping_keys
            && self.aggs == other.aggs
            && self.limit == other.limit
            && self.filter == other.filter
            && self.prune == other.prune
            && self.window_size == other.window_size
    }

    /// Same definition carried with another state.
    pub fn with_state(&self, state: RuleState) -> RuleRecord {
        RuleRecord {
            state,
            command: Command::BroadcastRule,
            ..self.clone()
        }
    }
}
