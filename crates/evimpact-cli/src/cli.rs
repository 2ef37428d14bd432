//! CLI argument definitions for evimpact.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `analyze` | Measure and aggregate event impact over JSON fixtures |
//! | `classify` | Classify one actual/forecast pair |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--log-level` | `warn` | Log filter, overrides `RUST_LOG` |
//!
//! # Examples
//!
//! ```bash
//! # NFP impact on EUR/USD, 30 minutes either side
//! evimpact analyze --events events.json --bars EUR/USD=eurusd_1m.json \
//!   --event-type nfp --from 2024-01-01T00:00:00Z --to 2024-12-31T00:00:00Z \
//!   --instrument EUR/USD --pre-mins 30 --post-mins 30 --forex-pip-defaults --pretty
//!
//! # Surprise class of a single print
//! evimpact classify --actual 275000 --forecast 200000
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// evimpact - economic event impact analysis
#[derive(Debug, Parser)]
#[command(
    name = "evimpact",
    author,
    version,
    about = "Measure how scheduled economic releases move currency pairs",
    long_about = "evimpact aligns historical price bars with economic release timestamps, \
computes per-event impact metrics and aggregates them per event type and instrument.\n\
\n\
Use 'evimpact <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log filter (e.g. `info`, `evimpact_core=debug`). Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Summary table for terminal display.
    Table,
    /// Single JSON envelope.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyse the impact of one event type on one or more instruments.
    ///
    /// Events and bars are read from JSON files. Bars are given per
    /// instrument as INSTRUMENT=FILE.
    ///
    /// # Examples
    ///
    ///   evimpact analyze --events cal.json --bars EUR/USD=eu.json --event-type cpi \
    ///     --from 2024-01-01T00:00:00Z --to 2024-07-01T00:00:00Z --instrument EUR/USD \
    ///     --forex-pip-defaults --by-surprise
    Analyze(AnalyzeArgs),

    /// Classify an actual value against its forecast.
    Classify(ClassifyArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// JSON array of event records.
    #[arg(long)]
    pub events: PathBuf,

    /// Price bars per instrument, as INSTRUMENT=FILE. Repeatable.
    #[arg(long = "bars", required = true, num_args = 1..)]
    pub bars: Vec<String>,

    /// Event type to analyse (nfp, cpi, core_cpi, ...).
    #[arg(long)]
    pub event_type: String,

    /// Period start (RFC 3339). Required unless --dates is given.
    #[arg(long, required_unless_present = "dates")]
    pub from: Option<String>,

    /// Period end (RFC 3339). Required unless --dates is given.
    #[arg(long, required_unless_present = "dates")]
    pub to: Option<String>,

    /// Explicit release instants (RFC 3339) instead of a period.
    #[arg(long, num_args = 1.., conflicts_with_all = ["from", "to"])]
    pub dates: Vec<String>,

    /// UTC offset (e.g. -05:00) of naive `YYYY-MM-DD HH:MM[AM|PM]` values
    /// given to --from, --to and --dates.
    #[arg(long, allow_hyphen_values = true)]
    pub source_offset: Option<String>,

    /// Instruments to analyse. Repeatable.
    #[arg(long = "instrument", required = true, num_args = 1..)]
    pub instruments: Vec<String>,

    /// Minutes before the event.
    #[arg(long, default_value_t = 30)]
    pub pre_mins: i64,

    /// Minutes after the event.
    #[arg(long, default_value_t = 60)]
    pub post_mins: i64,

    /// Bar interval (1m, 5m, 15m, 30m, 1h, 1d).
    #[arg(long, default_value = "1m")]
    pub interval: String,

    /// Consecutive missing bars tolerated before a record is low confidence.
    #[arg(long, default_value_t = 2)]
    pub max_gap: u32,

    /// JSON analysis configuration used instead of EVIMPACT_* variables.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Leave low-confidence records out of the statistics.
    #[arg(long, default_value_t = false)]
    pub exclude_low_confidence: bool,

    /// Add per-surprise-class statistics.
    #[arg(long, default_value_t = false)]
    pub by_surprise: bool,

    /// Add retracement, false-breakout and continuation statistics.
    #[arg(long, default_value_t = false)]
    pub patterns: bool,

    /// Fill missing pip scales with forex conventions (JPY pairs 0.01).
    #[arg(long, default_value_t = false)]
    pub forex_pip_defaults: bool,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub actual: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub forecast: Option<f64>,

    /// Relative tolerance; defaults to the configured surprise tolerance.
    #[arg(long)]
    pub tolerance: Option<f64>,
}
