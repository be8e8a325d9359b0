use fd_core::alert::AlertOrigin;
use fd_core::{KeyTuple, Pipeline, RuleExport, RuleRecord, RuleState, StoreEffect, Value};
use serde_json::json;

const HOUR: i64 = 3_600_000;

fn pipeline() -> Pipeline {
    Pipeline::new(fd_core::rule::DEFAULT_WINDOW_MS, "timestamp")
}

fn apply(p: &mut Pipeline, rule: serde_json::Value) -> StoreEffect {
    p.apply_mutation_json(&rule.to_string()).unwrap()
}

fn send(p: &mut Pipeline, event: serde_json::Value) -> Vec<fd_core::Alert> {
    p.process_event_json(&event.to_string()).unwrap()
}

fn payment_rule() -> serde_json::Value {
    json!({
        "id": 1,
        "state": "ACTIVE",
        "groupingKeys": ["payeeId", "beneficiaryId"],
        "aggs": [{"field": "payment.amount", "name": "amt", "func": "SUM"}],
        "limit": "\"amt\" > 200",
        "filter": "time(\"timestamp\") >= \"00:00:00\" && time(\"timestamp\") <= \"06:00:00\"",
        "windowSize": 24 * HOUR
    })
}

fn payment(amount: i64, ts: i64) -> serde_json::Value {
    json!({
        "timestamp": ts,
        "payeeId": 11,
        "beneficiaryId": 6,
        "payment": {"amount": amount, "currency": "EUR"},
        "device": {"ip": "10.0.0.1"}
    })
}

fn counter_key(card: i64) -> KeyTuple {
    KeyTuple::new(vec![Value::Int(card)])
}

#[test]
fn night_payments_alert_once_on_third_event() {
    let mut p = pipeline();
    apply(&mut p, payment_rule());

    assert!(send(&mut p, payment(80, 2 * HOUR)).is_empty());
    assert!(send(&mut p, payment(90, 2 * HOUR)).is_empty());
    let alerts = send(&mut p, payment(40, 2 * HOUR));
    assert_eq!(alerts.len(), 1);

    let alert = &alerts[0];
    assert_eq!(alert.rule_id, 1);
    assert_eq!(alert.origin, AlertOrigin::Event);
    assert_eq!(alert.aggregate("amt"), Some(&Value::Float(210.0)));
    assert_eq!(alert.key_value("payeeId"), Some(&Value::Int(11)));
    assert_eq!(alert.key_value("beneficiaryId"), Some(&Value::Int(6)));
    assert_eq!(alert.event.to_json(), payment(40, 2 * HOUR));

    // State keeps only grouping keys and aggregation sources.
    let key = KeyTuple::new(vec![Value::Int(11), Value::Int(6)]);
    let stored = p.engine().state_of(1, &key).unwrap().last_event().unwrap();
    assert_eq!(
        stored.to_json(),
        json!({"payeeId": 11, "beneficiaryId": 6, "payment": {"amount": 40}})
    );
}

#[test]
fn daytime_payments_are_filtered_out() {
    let mut p = pipeline();
    apply(&mut p, payment_rule());
    for amount in [150, 150] {
        assert!(send(&mut p, payment(amount, 9 * HOUR)).is_empty());
    }
    assert_eq!(p.engine().key_count(), 0);
}

#[test]
fn window_anchors_at_first_event() {
    let mut p = pipeline();
    apply(
        &mut p,
        json!({
            "id": 5,
            "groupingKeys": ["card"],
            "aggs": [{"field": "COUNT"}],
            "limit": "\"count\" >= 3",
            "windowSize": 4000
        }),
    );
    assert!(send(&mut p, json!({"timestamp": 0, "card": 1})).is_empty());
    assert!(send(&mut p, json!({"timestamp": 100, "card": 1})).is_empty());
    // The window closed at 4000, so this event starts a new one.
    assert!(send(&mut p, json!({"timestamp": 5000, "card": 1})).is_empty());

    let state = p.engine().state_of(5, &counter_key(1)).unwrap();
    assert_eq!(state.window_start(), 5000);
    assert_eq!(state.event_count(), 1);
}

#[test]
fn tick_closes_idle_windows() {
    let mut p = pipeline();
    apply(
        &mut p,
        json!({"id": 5, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": "\"count\" > 5", "windowSize": 4000}),
    );
    send(&mut p, json!({"timestamp": 0, "card": 1}));
    assert!(p.tick(3999).is_empty());
    assert_eq!(p.engine().key_count(), 1);
    p.tick(4000);
    assert_eq!(p.engine().key_count(), 0);
}

#[test]
fn count_with_reset_clears_after_alert() {
    let mut p = pipeline();
    apply(
        &mut p,
        json!({
            "id": 2,
            "groupingKeys": ["card"],
            "aggs": [{"field": "COUNT_WITH_RESET"}],
            "limit": "\"count\" > 2"
        }),
    );
    assert!(send(&mut p, json!({"timestamp": 1, "card": 7})).is_empty());
    assert!(send(&mut p, json!({"timestamp": 2, "card": 7})).is_empty());
    assert_eq!(send(&mut p, json!({"timestamp": 3, "card": 7})).len(), 1);
    assert!(p.engine().state_of(2, &counter_key(7)).is_none());
    assert_eq!(p.engine().pending_timers(), 0);
}

#[test]
fn export_then_reingest_reproduces_the_store() {
    let mut p = pipeline();
    apply(&mut p, payment_rule());
    apply(
        &mut p,
        json!({"id": 2, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": "\"count\" > 1"}),
    );
    apply(&mut p, json!({"id": 2, "state": "PAUSE"}));

    let StoreEffect::Exported(records) =
        apply(&mut p, json!({"state": "CONTROL", "command": "EXPORT_RULES_CURRENT"}))
    else {
        panic!("expected an export");
    };
    let line = serde_json::to_string(&RuleExport { rules: records }).unwrap();

    let mut copy = pipeline();
    let reingested: Vec<RuleRecord> = serde_json::from_str(&line).unwrap();
    for record in &reingested {
        copy.apply_mutation(record).unwrap();
    }

    assert_eq!(copy.export(), p.export());
    let active: Vec<i64> = copy.store().active_rules().map(|r| r.id).collect();
    assert_eq!(active, vec![1]);
    assert_eq!(copy.store().get(2).unwrap().state, RuleState::Pause);
    assert_eq!(
        copy.store().get(1).unwrap().grouping_keys,
        p.store().get(1).unwrap().grouping_keys
    );

    let events = [payment(80, 2 * HOUR), payment(90, 2 * HOUR), payment(40, 2 * HOUR)];
    let original: usize = events.iter().map(|e| send(&mut p, e.clone()).len()).sum();
    let replayed: usize = events.iter().map(|e| send(&mut copy, e.clone()).len()).sum();
    assert_eq!(original, 1);
    assert_eq!(original, replayed);
}

#[test]
fn clear_state_keeps_rules_and_delete_all_drops_them() {
    let mut p = pipeline();
    for id in [1, 2] {
        apply(
            &mut p,
            json!({"id": id, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": "\"count\" > 5", "windowSize": 1000}),
        );
    }
    send(&mut p, json!({"timestamp": 0, "card": 1}));
    send(&mut p, json!({"timestamp": 1, "card": 1}));
    assert_eq!(p.engine().key_count(), 2);
    assert_eq!(p.engine().pending_timers(), 2);

    assert!(matches!(
        apply(&mut p, json!({"state": "CONTROL", "command": "CLEAR_STATE_ALL"})),
        StoreEffect::ClearedAll { halted: false }
    ));
    assert_eq!(p.engine().key_count(), 0);
    assert_eq!(p.engine().pending_timers(), 0);
    assert!(!p.store().is_halted());
    assert_eq!(p.store().len(), 2);

    // Processing continues with a fresh count.
    send(&mut p, json!({"timestamp": 2, "card": 1}));
    assert_eq!(p.dropped_halted(), 0);
    for id in [1, 2] {
        let state = p.engine().state_of(id, &counter_key(1)).unwrap();
        assert_eq!(state.event_count(), 1);
        assert_eq!(state.window_start(), 2);
    }

    assert!(matches!(
        apply(&mut p, json!({"state": "CONTROL", "command": "DELETE_RULES_ALL"})),
        StoreEffect::DeletedAll
    ));
    assert_eq!(p.engine().key_count(), 0);
    assert_eq!(p.engine().pending_timers(), 0);
    assert!(p.store().is_empty());
    assert!(send(&mut p, json!({"timestamp": 3, "card": 1})).is_empty());
    assert_eq!(p.engine().key_count(), 0);
}

#[test]
fn identical_mutation_is_a_noop() {
    let mut p = pipeline();
    apply(&mut p, payment_rule());
    send(&mut p, payment(80, 2 * HOUR));

    assert!(matches!(apply(&mut p, payment_rule()), StoreEffect::Unchanged));
    let key = KeyTuple::new(vec![Value::Int(11), Value::Int(6)]);
    let state = p.engine().state_of(1, &key).unwrap();
    assert_eq!(state.event_count(), 1);
    assert_eq!(p.store().len(), 1);
}

#[test]
fn changed_definition_resets_state() {
    let mut p = pipeline();
    apply(&mut p, payment_rule());
    send(&mut p, payment(80, 2 * HOUR));

    let mut changed = payment_rule();
    changed["limit"] = json!("\"amt\" > 100");
    assert!(matches!(
        apply(&mut p, changed),
        StoreEffect::Installed { reset: true, .. }
    ));
    assert_eq!(p.engine().key_count(), 0);
    assert!(send(&mut p, payment(90, 2 * HOUR)).is_empty());
}

#[test]
fn active_without_grouping_keys_is_rejected() {
    let mut p = pipeline();
    let result =
        p.apply_mutation_json(&json!({"id": 4, "state": "ACTIVE", "limit": "true"}).to_string());
    assert!(result.is_err());
    assert!(p.store().get(4).is_none());
    assert!(p.export().rules.iter().all(|r| r.id != 4));
}

#[test]
fn pause_and_delete_cancel_timers() {
    let mut p = pipeline();
    apply(
        &mut p,
        json!({"id": 3, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": "\"count\" >= 1", "windowSize": 1000}),
    );
    send(&mut p, json!({"timestamp": 0, "card": 1}));
    assert_eq!(p.engine().pending_timers(), 1);

    apply(&mut p, json!({"id": 3, "state": "PAUSE"}));
    assert_eq!(p.engine().pending_timers(), 0);
    assert!(p.tick(10_000).is_empty());
    assert!(send(&mut p, json!({"timestamp": 10_001, "card": 1})).is_empty());
    assert_eq!(p.engine().key_count(), 1);

    apply(&mut p, json!({"id": 3, "state": "DELETE"}));
    assert_eq!(p.engine().key_count(), 0);
    assert_eq!(p.engine().pending_timers(), 0);
    assert!(p.tick(20_000).is_empty());
}

#[test]
fn stop_command_halts_until_next_broadcast() {
    let mut p = pipeline();
    apply(
        &mut p,
        json!({"id": 3, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": "\"count\" >= 1"}),
    );
    apply(&mut p, json!({"state": "CONTROL", "command": "CLEAR_STATE_ALL_STOP"}));
    assert!(send(&mut p, json!({"timestamp": 0, "card": 1})).is_empty());
    assert_eq!(p.dropped_halted(), 1);

    apply(&mut p, json!({"state": "CONTROL", "command": "BROADCAST_RULE"}));
    assert_eq!(send(&mut p, json!({"timestamp": 1, "card": 1})).len(), 1);
}

#[test]
fn rules_with_same_keys_aggregate_independently() {
    let mut p = pipeline();
    for id in [1, 2] {
        apply(
            &mut p,
            json!({"id": id, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": format!("\"count\" >= {id}")}),
        );
    }
    let first = send(&mut p, json!({"timestamp": 0, "card": 1}));
    assert_eq!(first.iter().map(|a| a.rule_id).collect::<Vec<_>>(), vec![1]);
    let second = send(&mut p, json!({"timestamp": 1, "card": 1}));
    assert_eq!(second.iter().map(|a| a.rule_id).collect::<Vec<_>>(), vec![1, 2]);
}
