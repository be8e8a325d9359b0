use crate::config::FraudConfig;
use crate::sink::parse_sink_uri;

/// Called automatically by `FraudConfig::from_str` / `load`.
pub(crate) fn validate(config: &FraudConfig) -> anyhow::Result<()> {
    if config.runtime.partitions == 0 {
        anyhow::bail!("runtime.partitions must be > 0");
    }
    if config.runtime.channel_capacity == 0 {
        anyhow::bail!("runtime.channel_capacity must be > 0");
    }
    if config.runtime.tick_interval.as_duration().is_zero() {
        anyhow::bail!("runtime.tick_interval must be > 0");
    }

    let ts = config.event.timestamp_field.trim();
    if ts.is_empty() || ts.split('.').any(str::is_empty) {
        anyhow::bail!(
            "event.timestamp_field must be a dotted field path, got {:?}",
            config.event.timestamp_field
        );
    }

    parse_sink_uri(&config.sinks.alerts).map_err(|e| anyhow::anyhow!("sinks.alerts: {e}"))?;
    parse_sink_uri(&config.sinks.exports).map_err(|e| anyhow::anyhow!("sinks.exports: {e}"))?;

    Ok(())
}
