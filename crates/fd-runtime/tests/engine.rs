use std::path::Path;
use std::str::FromStr;

use fd_config::FraudConfig;
use fd_runtime::Engine;
use serde_json::{Value as Json, json};

const HOUR: i64 = 3_600_000;

fn write_lines(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn read_json_lines(path: &Path) -> Vec<Json> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn payment(amount: i64, ts: i64) -> String {
    json!({
        "timestamp": ts,
        "payeeId": 11,
        "beneficiaryId": 6,
        "payment": {"amount": amount, "currency": "EUR"}
    })
    .to_string()
}

const CONFIG: &str = r#"
[runtime]
partitions = 3
channel_capacity = 8
tick_interval = "1h"

[sources]
rules = "rules/*.jsonl"
events = "events.jsonl"

[sinks]
alerts = "file://out/alerts.jsonl"
exports = "file://out/export.jsonl"

[logging]
level = "warn"
"#;

#[tokio::test]
async fn replays_rules_then_events_into_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();

    write_lines(
        &base.join("rules/01-payments.jsonl"),
        &[json!({
            "id": 1,
            "state": "ACTIVE",
            "groupingKeys": ["payeeId", "beneficiaryId"],
            "aggs": [{"field": "payment.amount", "name": "amt", "func": "SUM"}],
            "limit": "\"amt\" > 200",
            "filter": "time(\"timestamp\") >= \"00:00:00\" && time(\"timestamp\") <= \"06:00:00\"",
            "windowSize": 24 * HOUR
        })
        .to_string()],
    );
    write_lines(
        &base.join("rules/02-cards.jsonl"),
        &[
            json!({"id": 2, "groupingKeys": ["card"], "aggs": [{"field": "COUNT"}], "limit": "\"count\" > 3"})
                .to_string(),
            "{ broken".to_string(),
            json!({"state": "CONTROL", "command": "EXPORT_RULES_CURRENT"}).to_string(),
        ],
    );
    write_lines(
        &base.join("events.jsonl"),
        &[
            payment(80, 2 * HOUR),
            payment(500, 9 * HOUR),
            "[1, 2]".to_string(),
            payment(90, 2 * HOUR),
            payment(40, 2 * HOUR),
        ],
    );

    let config = FraudConfig::from_str(CONFIG).unwrap();
    let engine = Engine::start(config, base).await.unwrap();
    let metrics = engine.metrics();
    engine.wait().await.unwrap();

    let alerts = read_json_lines(&base.join("out/alerts.jsonl"));
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["ruleId"], json!(1));
    assert_eq!(alerts[0]["aggregates"]["amt"].as_f64(), Some(210.0));
    assert_eq!(alerts[0]["key"], json!({"payeeId": 11, "beneficiaryId": 6}));
    assert_eq!(alerts[0]["event"]["payment"]["currency"], json!("EUR"));

    let exports = read_json_lines(&base.join("out/export.jsonl"));
    assert_eq!(exports.len(), 1);
    let ids: Vec<i64> = exports[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);

    let s = metrics.snapshot();
    assert_eq!(s.events_in, 4);
    assert_eq!(s.malformed_lines, 2);
    assert_eq!(s.alerts, 1);
    assert_eq!(s.exports, 1);
    assert_eq!(s.mutations_applied, 3);
    assert_eq!(s.rejected_mutations, 0);
}

#[tokio::test]
async fn rejected_and_halting_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    write_lines(
        &base.join("rules/all.jsonl"),
        &[
            json!({"id": 3, "state": "ACTIVE", "limit": "true"}).to_string(),
            json!({"id": 4, "groupingKeys": ["card"], "limit": "true"}).to_string(),
            json!({"state": "CONTROL", "command": "CLEAR_STATE_ALL_STOP"}).to_string(),
        ],
    );
    write_lines(
        &base.join("events.jsonl"),
        &[json!({"timestamp": 1, "card": 1}).to_string()],
    );

    let config = FraudConfig::from_str(CONFIG).unwrap();
    let engine = Engine::start(config, base).await.unwrap();
    let metrics = engine.metrics();
    engine.wait().await.unwrap();

    let s = metrics.snapshot();
    assert_eq!(s.rejected_mutations, 1);
    assert_eq!(s.dropped_halted, 1);
    assert_eq!(s.alerts, 0);
    assert!(read_json_lines(&base.join("out/alerts.jsonl")).is_empty());
}

#[tokio::test]
async fn missing_event_file_fails_at_start() {
    let dir = tempfile::tempdir().unwrap();
    let config = FraudConfig::from_str(CONFIG).unwrap();
    assert!(Engine::start(config, dir.path()).await.is_err());
}
