mod record;

use std::collections::HashSet;
use std::sync::Arc;

use fd_lang::ast::{CompiledExpr, FieldPath};
use orion_error::prelude::*;

pub use record::{AggRecord, Command, PruneRecord, RuleId, RuleRecord, RuleState};

use crate::error::{CoreReason, CoreResult};

#[cfg(test)]
mod tests;

/// Window length used when a record carries no `windowSize`: one day.
pub const DEFAULT_WINDOW_MS: i64 = 86_400_000;

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunction {
    Sum,
    Avg,
    Min,
    Max,
    /// Keep the latest value of the source field.
    Group,
    Count,
    /// Count, then drop the key's whole state once the limit fires.
    CountWithReset,
}

impl AggFunction {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            "GROUP" => Some(Self::Group),
            "COUNT" => Some(Self::Count),
            "COUNT_WITH_RESET" => Some(Self::CountWithReset),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Group => "GROUP",
            Self::Count => "COUNT",
            Self::CountWithReset => "COUNT_WITH_RESET",
        }
    }

    pub fn is_counter(&self) -> bool {
        matches!(self, Self::Count | Self::CountWithReset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub name: String,
    /// `None` for the counting pseudo-fields.
    pub source: Option<FieldPath>,
    pub function: AggFunction,
}

/// Paths retained on stored events. Empty `keep` with `enabled == false`
/// means the whole event is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Pruning {
    pub enabled: bool,
    pub keep: Vec<FieldPath>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A compiled rule. Immutable; a new definition replaces it wholesale.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub state: RuleState,
    pub grouping_keys: Vec<FieldPath>,
    pub aggregations: Vec<Aggregation>,
    pub filter: Arc<CompiledExpr>,
    pub limit: Arc<CompiledExpr>,
    pub pruning: Pruning,
    pub window_ms: i64,
    record: RuleRecord,
}

impl Rule {
    /// Compile a rule body. Fails when an `ACTIVE` rule has no grouping keys,
    /// an aggregation is malformed or duplicated, a DSL text does not compile,
    /// or the window is negative.
    pub fn compile(record: &RuleRecord, default_window_ms: i64) -> CoreResult<Rule> {
        let id = record.id;
        let reject = |detail: String| {
            StructError::from(CoreReason::RuleCompile).with_detail(format!("rule {id}: {detail}"))
        };

        if matches!(record.state, RuleState::Delete | RuleState::Control) {
            return Err(reject(format!(
                "state {} carries no rule definition",
                record.state.as_str()
            )));
        }
        if record.grouping_keys.is_empty() {
            return Err(reject("groupingKeys must not be empty".to_string()));
        }

        let grouping_keys = record
            .grouping_keys
            .iter()
            .map(|k| FieldPath::parse(k).ok_or_else(|| reject(format!("bad grouping key '{k}'"))))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut names = HashSet::new();
        let mut aggregations = Vec::with_capacity(record.aggs.len());
        for agg in &record.aggs {
            let aggregation = compile_aggregation(agg).map_err(&reject)?;
            if !names.insert(aggregation.name.clone()) {
                return Err(reject(format!(
                    "duplicate aggregation name '{}'",
                    aggregation.name
                )));
            }
            aggregations.push(aggregation);
        }

        let filter = fd_lang::compile(&record.filter)
            .map_err(|e| reject(format!("filter: {e}")))?;
        let limit =
            fd_lang::compile(&record.limit).map_err(|e| reject(format!("limit: {e}")))?;

        let window_ms = record.window_size.unwrap_or(default_window_ms);
        if window_ms < 0 {
            return Err(reject(format!("negative windowSize {window_ms}")));
        }

        let pruning = if record.prune.enabled {
            let mut keep: Vec<FieldPath> = Vec::new();
            let reserved = record
                .prune
                .reserved
                .iter()
                .map(|r| FieldPath::parse(r).ok_or_else(|| reject(format!("bad reserved field '{r}'"))))
                .collect::<CoreResult<Vec<_>>>()?;
            let sources = aggregations.iter().filter_map(|a| a.source.clone());
            for path in reserved
                .into_iter()
                .chain(grouping_keys.iter().cloned())
                .chain(sources)
            {
                if !keep.contains(&path) {
                    keep.push(path);
                }
            }
            Pruning {
                enabled: true,
                keep,
            }
        } else {
            Pruning {
                enabled: false,
                keep: Vec::new(),
            }
        };

        Ok(Rule {
            id,
            state: record.state,
            grouping_keys,
            aggregations,
            filter: Arc::new(filter),
            limit: Arc::new(limit),
            pruning,
            window_ms,
            record: record.with_state(record.state),
        })
    }

    pub fn is_active(&self) -> bool {
        self.state == RuleState::Active
    }

    /// True when any aggregation drops the key state after an alert.
    pub fn resets_on_count(&self) -> bool {
        self.aggregations
            .iter()
            .any(|a| a.function == AggFunction::CountWithReset)
    }

    /// The definition in wire form, carrying the rule's current state.
    pub fn record(&self) -> &RuleRecord {
        &self.record
    }

    /// Same definition in another state, without recompiling.
    pub fn with_state(&self, state: RuleState) -> Rule {
        Rule {
            state,
            record: self.record.with_state(state),
            ..self.clone()
        }
    }
}

/// `COUNT` / `COUNT_WITH_RESET` may appear either as the pseudo-field or as
/// the function name. A missing name defaults to `count` for counters and to
/// the field path otherwise.
fn compile_aggregation(agg: &AggRecord) -> Result<Aggregation, String> {
    let pseudo = AggFunction::parse(&agg.field).filter(AggFunction::is_counter);
    let function = match pseudo {
        Some(f) => f,
        None => AggFunction::parse(&agg.func)
            .ok_or_else(|| format!("unknown aggregation function '{}'", agg.func))?,
    };

    let source = if function.is_counter() {
        None
    } else {
        Some(
            FieldPath::parse(&agg.field)
                .ok_or_else(|| format!("{} needs a source field", function.as_str()))?,
        )
    };

    let name = if !agg.name.trim().is_empty() {
        agg.name.trim().to_string()
    } else if function.is_counter() {
        "count".to_string()
    } else {
        agg.field.trim().to_string()
    };

    Ok(Aggregation {
        name,
        source,
        function,
    })
}
