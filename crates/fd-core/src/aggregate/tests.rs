use serde_json::json;

use super::*;
use crate::event::Event;
use crate::rule::{DEFAULT_WINDOW_MS, RuleRecord};
use crate::value::Value;

fn rule(json: serde_json::Value) -> Arc<Rule> {
    let record: RuleRecord = serde_json::from_value(json).unwrap();
    Arc::new(Rule::compile(&record, DEFAULT_WINDOW_MS).unwrap())
}

fn routed(rule: &Arc<Rule>, event: serde_json::Value) -> Routed {
    let event = Arc::new(Event::from_json(&event, "ts").unwrap());
    let key = KeyTuple::extract(&event, &rule.grouping_keys).unwrap();
    Routed {
        rule: Arc::clone(rule),
        key,
        event,
    }
}

fn key(v: i64) -> KeyTuple {
    KeyTuple::new(vec![Value::Int(v)])
}

fn counting_rule(limit: &str, window: i64) -> Arc<Rule> {
    rule(json!({
        "id": 1,
        "groupingKeys": ["card"],
        "aggs": [{"field": "COUNT", "func": "COUNT"}],
        "limit": limit,
        "windowSize": window
    }))
}

#[test]
fn window_is_anchored_at_first_event() {
    let r = counting_rule("\"count\" > 10", 4000);
    let mut engine = AggregationEngine::new();

    engine.process(routed(&r, json!({"ts": 0, "card": 1})));
    engine.process(routed(&r, json!({"ts": 100, "card": 1})));
    let state = engine.state_of(1, &key(1)).unwrap();
    assert_eq!(state.window_start(), 0);
    assert_eq!(state.deadline(), Some(4000));
    assert_eq!(state.event_count(), 2);

    engine.process(routed(&r, json!({"ts": 5000, "card": 1})));
    let state = engine.state_of(1, &key(1)).unwrap();
    assert_eq!(state.window_start(), 5000);
    assert_eq!(state.deadline(), Some(9000));
    assert_eq!(state.event_count(), 1);
    assert_eq!(engine.stats().windows_closed, 1);
    assert_eq!(engine.pending_timers(), 1);
}

#[test]
fn every_satisfying_event_alerts() {
    let r = rule(json!({
        "id": 3,
        "groupingKeys": ["card"],
        "aggs": [{"field": "amount", "name": "amt", "func": "SUM"}],
        "limit": "\"amt\" > 100"
    }));
    let mut engine = AggregationEngine::new();
    let first = engine.process(routed(&r, json!({"ts": 1, "card": 1, "amount": 150})));
    let second = engine.process(routed(&r, json!({"ts": 2, "card": 1, "amount": 10})));
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].aggregate("amt"), Some(&Value::Float(160.0)));
    assert_eq!(second[0].origin, AlertOrigin::Event);
}

#[test]
fn keys_are_independent() {
    let r = counting_rule("\"count\" >= 2", 1000);
    let mut engine = AggregationEngine::new();
    assert!(engine.process(routed(&r, json!({"ts": 0, "card": 1}))).is_empty());
    assert!(engine.process(routed(&r, json!({"ts": 1, "card": 2}))).is_empty());
    let alerts = engine.process(routed(&r, json!({"ts": 2, "card": 1})));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].key_value("card"), Some(&Value::Int(1)));
    assert_eq!(engine.key_count(), 2);
}

#[test]
fn count_with_reset_drops_state_on_alert() {
    let r = rule(json!({
        "id": 2,
        "groupingKeys": ["card"],
        "aggs": [{"field": "COUNT_WITH_RESET"}],
        "limit": "\"count\" > 2"
    }));
    let mut engine = AggregationEngine::new();
    assert!(engine.process(routed(&r, json!({"ts": 0, "card": 1}))).is_empty());
    assert!(engine.process(routed(&r, json!({"ts": 1, "card": 1}))).is_empty());
    let alerts = engine.process(routed(&r, json!({"ts": 2, "card": 1})));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].aggregate("count"), Some(&Value::Int(3)));
    assert!(engine.state_of(2, &key(1)).is_none());
    assert_eq!(engine.pending_timers(), 0);

    assert!(engine.process(routed(&r, json!({"ts": 3, "card": 1}))).is_empty());
    assert_eq!(engine.state_of(2, &key(1)).unwrap().event_count(), 1);
}

#[test]
fn window_close_alerts_only_when_not_already_alerted() {
    // The limit reads a field that pruning drops, so the check at window
    // close sees a different event than the per-event check did.
    let r = rule(json!({
        "id": 4,
        "groupingKeys": ["card"],
        "aggs": [{"field": "COUNT"}],
        "limit": "\"count\" >= 1 && !exist(\"blocked\")",
        "windowSize": 1000
    }));
    let mut engine = AggregationEngine::new();
    let alerts = engine.process(routed(&r, json!({"ts": 0, "card": 1, "blocked": true})));
    assert!(alerts.is_empty());

    let closed = engine.advance_to(1000);
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].origin, AlertOrigin::WindowClose);
    assert_eq!(closed[0].event_time, 1000);
    // Window-close alerts carry the stored, pruned event.
    assert_eq!(closed[0].event.to_json(), json!({"card": 1}));
    assert!(engine.state_of(4, &key(1)).is_none());

    let r = counting_rule("\"count\" >= 1", 1000);
    let mut engine = AggregationEngine::new();
    assert_eq!(engine.process(routed(&r, json!({"ts": 0, "card": 1}))).len(), 1);
    assert!(engine.advance_to(5000).is_empty());
    assert_eq!(engine.key_count(), 0);
}

#[test]
fn due_timers_fire_before_the_event() {
    let r = counting_rule("\"count\" >= 2", 100);
    let mut engine = AggregationEngine::new();
    engine.process(routed(&r, json!({"ts": 0, "card": 1})));
    // Exactly at the deadline the old window is gone.
    let alerts = engine.process(routed(&r, json!({"ts": 100, "card": 1})));
    assert!(alerts.is_empty());
    assert_eq!(engine.state_of(1, &key(1)).unwrap().window_start(), 100);
}

#[test]
fn state_keeps_pruned_event_and_alert_keeps_full_event() {
    let r = rule(json!({
        "id": 5,
        "groupingKeys": ["card"],
        "aggs": [{"field": "payment.amount", "name": "amt", "func": "MAX"}],
        "prune": {"enabled": true, "reserved": ["merchant"]}
    }));
    let raw = json!({"ts": 7, "card": 1, "merchant": "m", "payment": {"amount": 5, "iban": "x"}, "noise": 1});
    let mut engine = AggregationEngine::new();
    let alerts = engine.process(routed(&r, raw.clone()));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].event.to_json(), raw);
    assert_eq!(alerts[0].aggregate("amt"), Some(&Value::Float(5.0)));

    let stored = engine.state_of(5, &key(1)).unwrap().last_event().unwrap();
    assert_eq!(
        stored.to_json(),
        json!({"card": 1, "merchant": "m", "payment": {"amount": 5}})
    );
}

#[test]
fn suspend_keeps_state_and_resume_rearms() {
    let r = counting_rule("\"count\" > 10", 1000);
    let mut engine = AggregationEngine::new();
    engine.process(routed(&r, json!({"ts": 0, "card": 1})));
    engine.process(routed(&r, json!({"ts": 0, "card": 2})));

    engine.suspend_rule(1);
    assert_eq!(engine.pending_timers(), 0);
    assert!(engine.advance_to(10_000).is_empty());
    assert_eq!(engine.rule_key_count(1), 2);

    engine.resume_rule(&r);
    assert_eq!(engine.pending_timers(), 2);
    assert_eq!(engine.next_wake(), Some(1000));
    engine.advance_to(10_000);
    assert_eq!(engine.key_count(), 0);
}

#[test]
fn drop_and_clear() {
    let r = counting_rule("\"count\" > 10", 1000);
    let other = rule(json!({"id": 9, "groupingKeys": ["card"], "limit": "false"}));
    let mut engine = AggregationEngine::new();
    engine.process(routed(&r, json!({"ts": 0, "card": 1})));
    engine.process(routed(&other, json!({"ts": 0, "card": 1})));

    engine.drop_rule(1);
    assert_eq!(engine.rule_key_count(1), 0);
    assert_eq!(engine.pending_timers(), 1);

    engine.clear_all();
    assert_eq!(engine.key_count(), 0);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn deadline_overflow_is_retried() {
    let r = counting_rule("\"count\" > 10", i64::MAX);
    let mut engine = AggregationEngine::new();
    engine.process(routed(&r, json!({"ts": 10, "card": 1})));
    engine.process(routed(&r, json!({"ts": 20, "card": 1})));
    let state = engine.state_of(1, &key(1)).unwrap();
    assert_eq!(state.deadline(), None);
    assert_eq!(state.event_count(), 2);
    assert_eq!(engine.stats().state_errors, 2);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn limit_errors_do_not_alert() {
    let r = rule(json!({
        "id": 6,
        "groupingKeys": ["card"],
        "aggs": [{"field": "COUNT"}],
        "limit": "\"card\" #== \"x\""
    }));
    let mut engine = AggregationEngine::new();
    assert!(engine.process(routed(&r, json!({"ts": 0, "card": 1}))).is_empty());
    assert_eq!(engine.stats().limit_errors, 1);
}
