//! # evimpact Core
//!
//! Event-impact analysis engine: measures how scheduled releases (NFP, CPI,
//! rate decisions, ...) move currency pairs, and summarizes those moves across
//! many releases of the same type.
//!
//! ## Overview
//!
//! - **Window extraction** aligns price bars to each event in UTC and applies
//!   the gap policy
//! - **Impact metrics** per event and instrument: movement, volatility change,
//!   reaction lag, peak excursion, direction
//! - **Surprise classification** of actual versus forecast values
//! - **Aggregation** into per-group statistics with skip bookkeeping
//! - **Pattern detection** for retracements, false breakouts and trend
//!   continuation
//!
//! Price history and the event calendar are injected through the
//! [`PriceSeriesAccess`] and [`EventCatalog`] traits; the crate performs no
//! fetching of its own.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregate`] | Per-group folding, counts, breakdowns, rollup |
//! | [`cache`] | TTL caching decorator for price collaborators |
//! | [`config`] | Analysis configuration and pip scales |
//! | [`domain`] | Domain models (PriceBar, EventRecord, Instrument, Interval) |
//! | [`engine`] | Request types and the concurrent analysis engine |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`metrics`] | Per-event impact metrics |
//! | [`patterns`] | Post-event path patterns |
//! | [`source`] | Collaborator traits and errors |
//! | [`stats`] | Welford running statistics |
//! | [`store`] | In-memory collaborators and JSON fixture loading |
//! | [`surprise`] | Surprise classification |
//! | [`window`] | Event-aligned window extraction |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use evimpact_core::{
//!     AnalysisConfig, AnalysisEngine, AnalysisPeriod, AnalysisRequest, EventSelection,
//!     EventType, Instrument, Interval, MemoryEventCatalog, MemoryPriceStore, PipScales,
//!     UtcDateTime, WindowSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let eurusd = Instrument::parse("EUR/USD")?;
//!     let mut config = AnalysisConfig::from_env();
//!     config.pip_scales = PipScales::forex_defaults([&eurusd]);
//!
//!     let engine = AnalysisEngine::new(
//!         Arc::new(MemoryPriceStore::new()),
//!         Arc::new(MemoryEventCatalog::default()),
//!         config,
//!     )?;
//!
//!     let request = AnalysisRequest::new(
//!         EventSelection::ByType {
//!             event_type: EventType::Nfp,
//!             period: AnalysisPeriod::new(
//!                 UtcDateTime::parse("2024-01-01T00:00:00Z")?,
//!                 UtcDateTime::parse("2024-12-31T00:00:00Z")?,
//!             )?,
//!         },
//!         vec![eurusd],
//!         WindowSpec::new(
//!             time::Duration::minutes(30),
//!             time::Duration::minutes(60),
//!             Interval::OneMinute,
//!             2,
//!         )?,
//!     );
//!
//!     let result = engine.analyze(&request).await?;
//!     println!("{} groups", result.groups.len());
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod patterns;
pub mod source;
pub mod stats;
pub mod store;
pub mod surprise;
pub mod window;

pub use aggregate::{
    AggregateResult, Aggregator, CurrencyStrength, DirectionBias, EventOutcome, EventSpan,
    GroupAccumulator, GroupCounts, MetricAccumulator, MetricStatistics, Rollup,
    RollupAccumulator, SurpriseBucket,
};
pub use cache::CachedPriceSeries;
pub use config::{AnalysisConfig, PipScales};
pub use domain::{
    EventRecord, EventType, Instrument, Interval, PriceBar, SurprisePolarity, UtcDateTime,
};
pub use engine::{AnalysisEngine, AnalysisPeriod, AnalysisRequest, AnalysisResult, EventSelection};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};
pub use error::{AnalysisError, CoreError, ValidationError};
pub use metrics::{
    Direction, MetricComputer, MetricConfig, MetricOutcome, MetricRecord, PathPoint, SkipReason,
};
pub use patterns::{PatternConfig, PatternDetector, PatternStat, PatternStats};
pub use source::{BarQuery, EventCatalog, PriceSeriesAccess, SourceError, SourceErrorKind};
pub use stats::{MetricSummary, RunningStats};
pub use store::{load_bars_json, load_events_json, MemoryEventCatalog, MemoryPriceStore};
pub use surprise::{SurpriseClass, SurpriseClassifier, SurpriseConfig};
pub use window::{ExtractedWindow, WindowExtractor, WindowSpec};
