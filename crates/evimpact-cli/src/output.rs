use evimpact_core::Envelope;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(envelope)?,
    }

    Ok(())
}

fn render_table(envelope: &Envelope<Value>) -> Result<(), CliError> {
    println!("request_id  : {}", envelope.meta.request_id);
    println!("schema      : {}", envelope.meta.schema_version);
    println!("generated_at: {}", envelope.meta.generated_at);
    println!("latency_ms  : {}", envelope.meta.latency_ms);

    if !envelope.meta.warnings.is_empty() {
        println!("warnings:");
        for warning in &envelope.meta.warnings {
            println!("  - {warning}");
        }
    }

    if let Some(groups) = envelope.data.get("groups").and_then(Value::as_array) {
        println!("groups:");
        println!(
            "  {:<10} {:>6} {:>6} {:>6} {:>6} {:>12} {:>8} {:>8} {:>6}",
            "instrument", "total", "skip", "lowc", "norm", "mean_pips", "bull", "bear", "flat"
        );
        for group in groups {
            println!("  {}", group_row(group));
        }
    } else {
        println!("data:");
        let pretty_data = serde_json::to_string_pretty(&envelope.data)?;
        for line in pretty_data.lines() {
            println!("  {line}");
        }
    }

    if !envelope.errors.is_empty() {
        println!("errors:");
        for error in &envelope.errors {
            println!("  - {}: {}", error.code, error.message);
        }
    }

    Ok(())
}

fn group_row(group: &Value) -> String {
    let count = |path: [&str; 2]| group[path[0]][path[1]].as_u64().unwrap_or(0);
    let mean = group["metrics"]["movement_pips"]["mean"]
        .as_f64()
        .map_or_else(|| String::from("-"), |value| format!("{value:.2}"));

    format!(
        "{:<10} {:>6} {:>6} {:>6} {:>6} {:>12} {:>8} {:>8} {:>6}",
        group["instrument"].as_str().unwrap_or("?"),
        count(["counts", "total_events"]),
        count(["counts", "skipped"]),
        count(["counts", "low_confidence"]),
        count(["counts", "normal"]),
        mean,
        count(["direction_bias", "bullish"]),
        count(["direction_bias", "bearish"]),
        count(["direction_bias", "flat"]),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn group_row_tolerates_missing_mean() {
        let row = group_row(&json!({
            "instrument": "EUR/USD",
            "counts": {"total_events": 3, "skipped": 1, "low_confidence": 0, "normal": 2},
            "metrics": {"movement_pips": {"count": 0, "mean": null}},
            "direction_bias": {"bullish": 1, "bearish": 1, "flat": 0}
        }));

        assert!(row.starts_with("EUR/USD"));
        assert!(row.contains(" - "));
    }
}
