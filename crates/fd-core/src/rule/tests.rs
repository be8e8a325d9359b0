use serde_json::json;

use super::*;

fn record(json: serde_json::Value) -> RuleRecord {
    serde_json::from_value(json).unwrap()
}

#[test]
fn decode_applies_defaults() {
    let r = record(json!({"id": 7, "state": "ACTIVE", "groupingKeys": ["payeeId"]}));
    assert_eq!(r.id, 7);
    assert_eq!(r.state, RuleState::Active);
    assert_eq!(r.command, Command::BroadcastRule);
    assert!(r.prune.enabled);
    assert!(r.prune.reserved.is_empty());
    assert_eq!(r.window_size, None);
    assert_eq!(r.limit, "");

    let rule = Rule::compile(&r, DEFAULT_WINDOW_MS).unwrap();
    assert_eq!(rule.window_ms, DEFAULT_WINDOW_MS);
    assert!(rule.filter.is_trivial());
}

#[test]
fn decode_ignores_unknown_fields() {
    let r = record(json!({
        "id": 1,
        "state": "PAUSE",
        "groupingKeys": ["a"],
        "owner": "fraud-team"
    }));
    assert_eq!(r.state, RuleState::Pause);
}

#[test]
fn control_record_without_id() {
    let r = record(json!({"state": "CONTROL", "command": "EXPORT_RULES_CURRENT"}));
    assert_eq!(r.state, RuleState::Control);
    assert_eq!(r.command, Command::ExportRulesCurrent);
    assert!(Rule::compile(&r, DEFAULT_WINDOW_MS).is_err());
}

#[test]
fn compile_full_rule() {
    let r = record(json!({
        "id": 1,
        "state": "ACTIVE",
        "groupingKeys": ["payeeId", "beneficiaryId"],
        "aggs": [
            {"field": "payment.amount", "name": "amt", "func": "SUM"},
            {"field": "COUNT", "name": "n"},
            {"field": "currency", "name": "cur", "func": "group"}
        ],
        "limit": "\"amt\" > 200",
        "filter": "time(\"ts\") >= \"00:00:00\"",
        "prune": {"enabled": true, "reserved": ["merchant.id"]},
        "windowSize": 4000
    }));
    let rule = Rule::compile(&r, DEFAULT_WINDOW_MS).unwrap();
    assert_eq!(rule.grouping_keys.len(), 2);
    assert_eq!(rule.window_ms, 4000);
    assert_eq!(rule.aggregations[0].function, AggFunction::Sum);
    assert_eq!(rule.aggregations[1].function, AggFunction::Count);
    assert_eq!(rule.aggregations[1].source, None);
    assert_eq!(rule.aggregations[2].function, AggFunction::Group);
    let keep: Vec<&str> = rule.pruning.keep.iter().map(|p| p.as_str()).collect();
    assert_eq!(
        keep,
        vec![
            "merchant.id",
            "payeeId",
            "beneficiaryId",
            "payment.amount",
            "currency"
        ]
    );
}

#[test]
fn counter_defaults_name() {
    let r = record(json!({
        "id": 2,
        "groupingKeys": ["card"],
        "aggs": [{"field": "COUNT_WITH_RESET"}]
    }));
    let rule = Rule::compile(&r, DEFAULT_WINDOW_MS).unwrap();
    assert_eq!(rule.aggregations[0].name, "count");
    assert!(rule.resets_on_count());
}

#[test]
fn active_without_grouping_keys_rejected() {
    let r = record(json!({"id": 3, "state": "ACTIVE", "limit": "\"count\" > 1"}));
    assert!(Rule::compile(&r, DEFAULT_WINDOW_MS).is_err());
}

#[test]
fn malformed_rules_rejected() {
    let cases = [
        json!({"id": 1, "groupingKeys": ["a"], "aggs": [{"field": "x", "name": "s", "func": "MEDIAN"}]}),
        json!({"id": 1, "groupingKeys": ["a"], "aggs": [
            {"field": "x", "name": "s", "func": "SUM"},
            {"field": "y", "name": "s", "func": "MAX"}
        ]}),
        json!({"id": 1, "groupingKeys": ["a"], "aggs": [{"field": "", "name": "s", "func": "SUM"}]}),
        json!({"id": 1, "groupingKeys": ["a"], "limit": "\"x\" == 3"}),
        json!({"id": 1, "groupingKeys": ["a"], "filter": "time(\"ts\") > \"noon\""}),
        json!({"id": 1, "groupingKeys": ["a"], "windowSize": -1}),
        json!({"id": 1, "groupingKeys": [""]}),
    ];
    for case in cases {
        let r = record(case.clone());
        assert!(Rule::compile(&r, DEFAULT_WINDOW_MS).is_err(), "{case}");
    }
}

#[test]
fn pruning_disabled_keeps_nothing_listed() {
    let r = record(json!({
        "id": 4,
        "groupingKeys": ["a"],
        "prune": {"enabled": false}
    }));
    let rule = Rule::compile(&r, DEFAULT_WINDOW_MS).unwrap();
    assert!(!rule.pruning.enabled);
}

#[test]
fn export_form_omits_absent_window() {
    let r = record(json!({"id": 5, "groupingKeys": ["a"]}));
    let json = serde_json::to_value(&r).unwrap();
    assert!(json.get("windowSize").is_none());
    assert_eq!(json["groupingKeys"], json!(["a"]));
    assert_eq!(json["state"], "ACTIVE");
    assert_eq!(json["command"], "BROADCAST_RULE");
}
