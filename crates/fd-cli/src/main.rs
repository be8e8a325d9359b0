use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};

use fd_config::FraudConfig;
use fd_core::eval::{EvalContext, evaluate, matches};
use fd_core::{Event, RuleRecord, RuleStore, StoreEffect, Value};
use fd_runtime::lifecycle::{Engine, wait_for_signal};
use fd_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "fraudwatch", about = "Dynamic fraud-detection rule engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the configured rule and event sources through the engine
    Run {
        /// Path to fraudwatch.toml
        #[arg(short, long)]
        config: PathBuf,
        /// Override runtime.partitions
        #[arg(long)]
        partitions: Option<usize>,
    },
    /// Apply rule mutation files to an empty store and report every record
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Evaluate one expression against one JSON event
    Eval {
        #[arg(long)]
        expr: String,
        #[arg(long)]
        event: String,
        /// Read the event time from this field (default: time 0)
        #[arg(long)]
        timestamp_field: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, partitions } => run(&config, partitions).await,
        Commands::Check { files } => check(&files),
        Commands::Eval {
            expr,
            event,
            timestamp_field,
        } => eval(&expr, &event, timestamp_field.as_deref()),
    }
}

async fn run(config: &Path, partitions: Option<usize>) -> Result<()> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow!("config path '{}': {e}", config.display()))?;
    let mut fraud_config = FraudConfig::load(&config_path)?;
    if let Some(n) = partitions {
        if n == 0 {
            bail!("--partitions must be at least 1");
        }
        fraud_config.runtime.partitions = n;
    }
    let base_dir = config_path
        .parent()
        .ok_or_else(|| anyhow!("config path has no parent directory"))?;

    let _guard = init_tracing(&fraud_config.logging, base_dir)?;

    let engine = Engine::start(fraud_config, base_dir)
        .await
        .map_err(|e| anyhow!("{e}"))?;
    let metrics = engine.metrics();
    tokio::spawn(wait_for_signal(engine.cancel_token()));
    engine.wait().await.map_err(|e| anyhow!("{e}"))?;

    let totals = metrics.snapshot();
    tracing::info!(
        domain = "sys",
        events = totals.events_in,
        alerts = totals.alerts,
        "fraudwatch finished"
    );
    Ok(())
}

fn check(files: &[PathBuf]) -> Result<()> {
    let mut store = RuleStore::default();
    let mut total = 0usize;
    let mut rejected = 0usize;

    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            total += 1;
            let at = format!("{}:{}", file.display(), idx + 1);
            let outcome = RuleRecord::from_json_str(line)
                .map_err(|e| format!("invalid record: {e}"))
                .and_then(|record| store.apply(&record).map_err(|e| e.to_string()));
            match outcome {
                Ok(effect) => println!("{at}: ok, {}", describe(&effect)),
                Err(e) => {
                    rejected += 1;
                    println!("{at}: rejected, {e}");
                }
            }
        }
    }

    println!(
        "{total} records, {rejected} rejected, {} rules in store",
        store.len()
    );
    if rejected > 0 {
        bail!("{rejected} of {total} records rejected");
    }
    Ok(())
}

fn describe(effect: &StoreEffect) -> String {
    match effect {
        StoreEffect::Installed { rule, reset: false } => format!("rule {} installed", rule.id),
        StoreEffect::Installed { rule, reset: true } => format!("rule {} replaced", rule.id),
        StoreEffect::Resumed(rule) => format!("rule {} resumed", rule.id),
        StoreEffect::Paused { rule, .. } => format!("rule {} paused", rule.id),
        StoreEffect::Deleted(id) => format!("rule {id} deleted"),
        StoreEffect::Unchanged => "unchanged".to_string(),
        StoreEffect::ClearedAll { halted: false } => "state cleared".to_string(),
        StoreEffect::ClearedAll { halted: true } => "state cleared, processing halted".to_string(),
        StoreEffect::DeletedAll => "all rules deleted".to_string(),
        StoreEffect::Exported(records) => format!("export of {} rules", records.len()),
    }
}

fn eval(expr: &str, event: &str, timestamp_field: Option<&str>) -> Result<()> {
    let compiled = fd_lang::compile(expr).map_err(|e| anyhow!("compile error: {e}"))?;
    let json: serde_json::Value =
        serde_json::from_str(event).context("event is not valid JSON")?;
    let event = match timestamp_field {
        Some(field) => Event::from_json(&json, field).map_err(|e| anyhow!("{e}"))?,
        None => match Value::from_json(&json) {
            Value::Record(body) => Event::new(body, 0),
            other => bail!("event must be a JSON object, got {}", other.type_name()),
        },
    };

    let ctx = EvalContext::event(&event);
    match evaluate(compiled.expr(), &ctx).map_err(|e| anyhow!("evaluation error: {e}"))? {
        Some(value) => println!("value: {value}"),
        None => println!("value: <unresolved>"),
    }
    let hit = matches(&compiled, &ctx).map_err(|e| anyhow!("evaluation error: {e}"))?;
    println!("matches: {hit}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_accepts_events_without_timestamp() {
        assert!(eval("\"amount\" > 5", r#"{"amount": 10}"#, None).is_ok());
        assert!(eval("\"amount\" >", r#"{"amount": 10}"#, None).is_err());
        assert!(eval("true", "[1]", None).is_err());
        assert!(eval("true", r#"{"amount": 10}"#, Some("ts")).is_err());
    }

    #[test]
    fn describe_names_the_rule() {
        assert_eq!(describe(&StoreEffect::Deleted(4)), "rule 4 deleted");
        assert_eq!(describe(&StoreEffect::Exported(Vec::new())), "export of 0 rules");
    }
}
