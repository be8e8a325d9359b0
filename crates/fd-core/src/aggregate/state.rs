use std::sync::Arc;

use crate::eval::Aggregates;
use crate::event::Event;
use crate::rule::{AggFunction, Aggregation, Rule};
use crate::value::{Value, coerce_number};

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Accumulator {
    Sum(f64),
    Avg { sum: f64, count: u64 },
    Min(Option<f64>),
    Max(Option<f64>),
    Group(Option<Value>),
    Count(u64),
}

impl Accumulator {
    fn new(function: AggFunction) -> Self {
        match function {
            AggFunction::Sum => Self::Sum(0.0),
            AggFunction::Avg => Self::Avg { sum: 0.0, count: 0 },
            AggFunction::Min => Self::Min(None),
            AggFunction::Max => Self::Max(None),
            AggFunction::Group => Self::Group(None),
            AggFunction::Count | AggFunction::CountWithReset => Self::Count(0),
        }
    }

    /// Non-numeric or missing source values leave numeric accumulators as
    /// they are.
    fn update(&mut self, source: Option<&Value>) {
        let number = source.and_then(coerce_number);
        match self {
            Self::Sum(sum) => {
                if let Some(v) = number {
                    *sum += v;
                }
            }
            Self::Avg { sum, count } => {
                if let Some(v) = number {
                    *sum += v;
                    *count += 1;
                }
            }
            Self::Min(min) => {
                if let Some(v) = number {
                    *min = Some(min.map_or(v, |m| m.min(v)));
                }
            }
            Self::Max(max) => {
                if let Some(v) = number {
                    *max = Some(max.map_or(v, |m| m.max(v)));
                }
            }
            Self::Group(latest) => {
                if let Some(v) = source {
                    *latest = Some(v.clone());
                }
            }
            Self::Count(n) => *n += 1,
        }
    }

    fn value(&self) -> Value {
        match self {
            Self::Sum(sum) => Value::Float(*sum),
            Self::Avg { count: 0, .. } => Value::Null,
            Self::Avg { sum, count } => Value::Float(*sum / *count as f64),
            Self::Min(v) | Self::Max(v) => v.map_or(Value::Null, Value::Float),
            Self::Group(v) => v.clone().unwrap_or(Value::Null),
            Self::Count(n) => Value::Int(i64::try_from(*n).unwrap_or(i64::MAX)),
        }
    }
}

// ---------------------------------------------------------------------------
// AggregateState
// ---------------------------------------------------------------------------

/// Running aggregates for one `(rule, key)` within its current window.
#[derive(Debug, Clone)]
pub struct AggregateState {
    window_start: i64,
    /// Armed timer deadline; `None` while registration is pending.
    pub(super) deadline: Option<i64>,
    accumulators: Vec<Accumulator>,
    last_event: Option<Arc<Event>>,
    events: u64,
    /// Whether the most recent per-event limit check produced an alert.
    pub(super) alerted: bool,
}

impl AggregateState {
    pub(super) fn new(aggregations: &[Aggregation], window_start: i64) -> Self {
        Self {
            window_start,
            deadline: None,
            accumulators: aggregations
                .iter()
                .map(|a| Accumulator::new(a.function))
                .collect(),
            last_event: None,
            events: 0,
            alerted: false,
        }
    }

    /// Fold one event into every accumulator. `full` is the event as
    /// received; `stored` is what the state retains.
    pub(super) fn update(&mut self, aggregations: &[Aggregation], full: &Event, stored: Arc<Event>) {
        for (acc, agg) in self.accumulators.iter_mut().zip(aggregations) {
            let source = agg.source.as_ref().and_then(|path| full.resolve(path));
            acc.update(source);
        }
        self.last_event = Some(stored);
        self.events += 1;
    }

    /// Aggregate values by declared name.
    pub fn snapshot(&self, rule: &Rule) -> Aggregates {
        rule.aggregations
            .iter()
            .zip(&self.accumulators)
            .map(|(agg, acc)| (agg.name.clone(), acc.value()))
            .collect()
    }

    /// Timestamp of the first event of the current window.
    pub fn window_start(&self) -> i64 {
        self.window_start
    }

    pub fn deadline(&self) -> Option<i64> {
        self.deadline
    }

    pub fn event_count(&self) -> u64 {
        self.events
    }

    /// The most recent event, as retained after pruning.
    pub fn last_event(&self) -> Option<&Arc<Event>> {
        self.last_event.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_lang::ast::FieldPath;

    fn agg(name: &str, source: Option<&str>, function: AggFunction) -> Aggregation {
        Aggregation {
            name: name.to_string(),
            source: source.and_then(FieldPath::parse),
            function,
        }
    }

    #[test]
    fn accumulators_follow_their_function() {
        let mut sum = Accumulator::new(AggFunction::Sum);
        let mut avg = Accumulator::new(AggFunction::Avg);
        let mut min = Accumulator::new(AggFunction::Min);
        let mut max = Accumulator::new(AggFunction::Max);
        let mut group = Accumulator::new(AggFunction::Group);
        let mut count = Accumulator::new(AggFunction::Count);
        assert_eq!(avg.value(), Value::Null);
        assert_eq!(min.value(), Value::Null);

        for v in [Value::Int(4), Value::Str("2.5".into()), Value::Str("x".into())] {
            for acc in [&mut sum, &mut avg, &mut min, &mut max, &mut group, &mut count] {
                acc.update(Some(&v));
            }
        }
        assert_eq!(sum.value(), Value::Float(6.5));
        assert_eq!(avg.value(), Value::Float(3.25));
        assert_eq!(min.value(), Value::Float(2.5));
        assert_eq!(max.value(), Value::Float(4.0));
        assert_eq!(group.value(), Value::Str("x".into()));
        assert_eq!(count.value(), Value::Int(3));
    }

    #[test]
    fn missing_source_only_counts() {
        let aggs = vec![
            agg("total", Some("amount"), AggFunction::Sum),
            agg("count", None, AggFunction::Count),
        ];
        let mut state = AggregateState::new(&aggs, 0);
        let event = Arc::new(Event::new(Default::default(), 0));
        state.update(&aggs, &event, Arc::clone(&event));
        assert_eq!(state.event_count(), 1);
        assert_eq!(state.accumulators[0].value(), Value::Float(0.0));
        assert_eq!(state.accumulators[1].value(), Value::Int(1));
    }
}
