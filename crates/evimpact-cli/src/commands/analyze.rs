use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use evimpact_core::{
    load_bars_json, load_events_json, AnalysisConfig, AnalysisEngine, AnalysisPeriod,
    AnalysisRequest, AnalysisResult, CoreError, EnvelopeError, EventSelection, EventType,
    Instrument, Interval, MemoryEventCatalog, MemoryPriceStore, PipScales, SkipReason,
    UtcDateTime, WindowSpec,
};
use time::macros::format_description;
use time::{Duration, UtcOffset};

use crate::cli::AnalyzeArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &AnalyzeArgs) -> Result<CommandResult, CliError> {
    let started = Instant::now();

    let event_type: EventType = args.event_type.parse()?;
    let interval: Interval = args.interval.parse()?;
    let instruments = args
        .instruments
        .iter()
        .map(|raw| Instrument::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::from_env(),
    };
    if args.forex_pip_defaults {
        let mut scales = PipScales::forex_defaults(&instruments);
        scales.extend(config.pip_scales);
        config.pip_scales = scales;
    }

    let mut store = MemoryPriceStore::new();
    for spec in &args.bars {
        let (instrument, path) = parse_bars_arg(spec)?;
        let bars = load_bars_json(Path::new(path)).map_err(|source| load_error(path, source))?;
        store.insert_series(instrument, interval, bars)?;
    }
    let events = load_events_json(&args.events)
        .map_err(|source| load_error(&args.events.display().to_string(), source))?;
    log::info!("loaded {} event(s) from {}", events.len(), args.events.display());
    let catalog = MemoryEventCatalog::new(events)?;

    let window_spec = WindowSpec::new(
        minutes_arg("--pre-mins", args.pre_mins)?,
        minutes_arg("--post-mins", args.post_mins)?,
        interval,
        args.max_gap,
    )?;

    let mut request = AnalysisRequest::new(selection(args, event_type)?, instruments, window_spec)
        .include_low_confidence(!args.exclude_low_confidence);
    if args.by_surprise {
        request = request.with_surprise_breakdown();
    }
    if args.patterns {
        request = request.with_pattern_analysis();
    }

    let engine = AnalysisEngine::new(Arc::new(store), Arc::new(catalog), config)?;
    let result = engine.analyze(&request).await?;

    let warnings = result.warnings.clone();
    let errors = group_errors(&result)?;
    let data = serde_json::to_value(&result)?;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(CommandResult::ok(data)
        .with_warnings(warnings)
        .with_errors(errors)
        .with_latency(latency_ms))
}

fn selection(args: &AnalyzeArgs, event_type: EventType) -> Result<EventSelection, CliError> {
    let offset = args
        .source_offset
        .as_deref()
        .map(parse_offset)
        .transpose()?;
    let instant = |raw: &str| match offset {
        Some(offset) => UtcDateTime::parse_local(raw, offset),
        None => UtcDateTime::parse(raw),
    };

    if !args.dates.is_empty() {
        let dates = args
            .dates
            .iter()
            .map(|raw| instant(raw.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(EventSelection::Explicit { event_type, dates });
    }

    let (Some(from), Some(to)) = (&args.from, &args.to) else {
        return Err(CliError::Command(String::from(
            "either --dates or both --from and --to are required",
        )));
    };
    let period = AnalysisPeriod::new(instant(from.as_str())?, instant(to.as_str())?)?;
    Ok(EventSelection::ByType { event_type, period })
}

fn minutes_arg(flag: &str, minutes: i64) -> Result<Duration, CliError> {
    minutes
        .checked_mul(60)
        .map(Duration::seconds)
        .ok_or_else(|| CliError::Command(format!("{flag} is too large: {minutes}")))
}

fn parse_offset(raw: &str) -> Result<UtcOffset, CliError> {
    UtcOffset::parse(
        raw.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| {
        CliError::Command(format!(
            "--source-offset expects +HH:MM or -HH:MM, got '{raw}'"
        ))
    })
}

/// One envelope error per group in which every event was skipped.
fn group_errors(result: &AnalysisResult) -> Result<Vec<EnvelopeError>, CliError> {
    let mut errors = Vec::new();
    for group in &result.groups {
        let counts = group.counts;
        if counts.total_events == 0 || counts.skipped < counts.total_events {
            continue;
        }

        let retryable = group
            .skip_reasons
            .keys()
            .any(|reason| matches!(reason, SkipReason::TimedOut | SkipReason::DataUnavailable));
        let details = group
            .skip_reasons
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect::<Vec<_>>()
            .join(", ");

        let error = EnvelopeError::new(
            "analysis.no_records",
            format!(
                "{}: all {} event(s) skipped",
                group.instrument, counts.total_events
            ),
        )?
        .with_retryable(retryable)
        .with_details(details);
        errors.push(error);
    }
    Ok(errors)
}

fn parse_bars_arg(raw: &str) -> Result<(Instrument, &str), CliError> {
    let (instrument, path) = raw.split_once('=').ok_or_else(|| {
        CliError::Command(format!("--bars expects INSTRUMENT=FILE, got '{raw}'"))
    })?;
    if path.trim().is_empty() {
        return Err(CliError::Command(format!("--bars '{raw}' has no file path")));
    }
    Ok((Instrument::parse(instrument)?, path.trim()))
}

fn load_config(path: &Path) -> Result<AnalysisConfig, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|error| load_error(&path.display().to_string(), CoreError::Io(error)))?;
    let config = serde_json::from_str(&raw).map_err(|error| {
        load_error(&path.display().to_string(), CoreError::Serialization(error))
    })?;
    Ok(config)
}

fn load_error(path: &str, source: CoreError) -> CliError {
    CliError::Load {
        path: path.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_json(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    fn bars_fixture() -> NamedTempFile {
        let mut bars = Vec::new();
        // 13:25 .. 13:40, rising 1 pip per minute from 1.1000, +20 pips jump at 13:30.
        for minute in 25..=40 {
            let mut close = 1.1000 + f64::from(minute - 25) * 0.0001;
            if minute >= 30 {
                close += 0.0020;
            }
            bars.push(format!(
                r#"{{"ts":"2024-03-08T13:{minute:02}:00Z","open":{close},"high":{close},"low":{close},"close":{close}}}"#
            ));
        }
        write_json(&format!("[{}]", bars.join(",")))
    }

    fn events_fixture() -> NamedTempFile {
        write_json(
            r#"[{"event_type":"nfp","timestamp":"2024-03-08T13:30:00Z","actual":275.0,"forecast":200.0,"currency":"USD"}]"#,
        )
    }

    fn args(events: PathBuf, bars: &str) -> AnalyzeArgs {
        AnalyzeArgs {
            events,
            bars: vec![bars.to_owned()],
            event_type: String::from("nfp"),
            from: Some(String::from("2024-03-01T00:00:00Z")),
            to: Some(String::from("2024-03-31T00:00:00Z")),
            dates: Vec::new(),
            source_offset: None,
            instruments: vec![String::from("EUR/USD")],
            pre_mins: 5,
            post_mins: 10,
            interval: String::from("1m"),
            max_gap: 0,
            config: None,
            exclude_low_confidence: false,
            by_surprise: true,
            patterns: true,
            forex_pip_defaults: true,
        }
    }

    #[tokio::test]
    async fn analyzes_fixture_files() {
        let bars = bars_fixture();
        let events = events_fixture();
        let spec = format!("EUR/USD={}", bars.path().display());

        let result = run(&args(events.path().to_path_buf(), &spec))
            .await
            .expect("analysis runs");

        let group = &result.data["groups"][0];
        assert_eq!(group["instrument"], "EUR/USD");
        assert_eq!(group["counts"]["total_events"], 1);
        assert_eq!(group["counts"]["normal"], 1);
        assert_eq!(group["direction_bias"]["bullish"], 1);
        assert_eq!(group["surprise_breakdown"]["positive"]["count"], 1);
        assert!(group["patterns"].is_object());
        assert!(result.warnings.is_empty());
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn fully_skipped_group_becomes_an_envelope_error() {
        let bars = bars_fixture();
        let events = events_fixture();
        let spec = format!("EUR/USD={}", bars.path().display());
        let mut args = args(events.path().to_path_buf(), &spec);
        args.instruments.push(String::from("GBP/USD"));

        let result = run(&args).await.expect("analysis runs");

        assert_eq!(result.errors.len(), 1);
        let error = &result.errors[0];
        assert_eq!(error.code, "analysis.no_records");
        assert!(error.message.starts_with("GBP/USD"));
        assert_eq!(error.retryable, Some(true));
        assert_eq!(error.details.as_deref(), Some("data_unavailable=1"));
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn naive_dates_are_read_in_the_source_offset() {
        let mut args = args(PathBuf::from("events.json"), "EUR/USD=bars.json");
        args.from = None;
        args.to = None;
        args.dates = vec![String::from("2024-03-08 08:30 AM")];
        args.source_offset = Some(String::from("-05:00"));

        let EventSelection::Explicit { dates, .. } =
            selection(&args, EventType::Nfp).expect("valid selection")
        else {
            panic!("explicit selection expected");
        };
        assert_eq!(dates[0].to_string(), "2024-03-08T13:30:00Z");

        args.source_offset = Some(String::from("EST"));
        assert!(matches!(
            selection(&args, EventType::Nfp),
            Err(CliError::Command(_))
        ));
    }

    #[tokio::test]
    async fn missing_pip_scale_is_a_configuration_error() {
        let bars = bars_fixture();
        let events = events_fixture();
        let spec = format!("EUR/USD={}", bars.path().display());
        let mut args = args(events.path().to_path_buf(), &spec);
        args.forex_pip_defaults = false;

        let err = run(&args).await.err().expect("must fail");
        assert!(matches!(err, CliError::Analysis(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn missing_events_file_maps_to_io_exit_code() {
        let bars = bars_fixture();
        let spec = format!("EUR/USD={}", bars.path().display());
        let args = args(PathBuf::from("/definitely/not/here.json"), &spec);

        let err = run(&args).await.err().expect("must fail");
        assert_eq!(err.exit_code(), 10);
    }

    #[tokio::test]
    async fn oversized_minute_arguments_are_command_errors() {
        let bars = bars_fixture();
        let events = events_fixture();
        let spec = format!("EUR/USD={}", bars.path().display());
        let mut args = args(events.path().to_path_buf(), &spec);
        args.pre_mins = i64::MAX;

        let err = run(&args).await.err().expect("must fail");
        assert!(matches!(err, CliError::Command(ref message) if message.contains("--pre-mins")));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_malformed_bars_argument() {
        assert!(matches!(
            parse_bars_arg("EURUSD.json"),
            Err(CliError::Command(_))
        ));
        let (instrument, path) = parse_bars_arg("eurusd=bars.json").expect("valid");
        assert_eq!(instrument.as_str(), "EUR/USD");
        assert_eq!(path, "bars.json");
    }
}
