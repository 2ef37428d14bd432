//! Request orchestration.
//!
//! [`AnalysisEngine::analyze`] resolves the requested events, then runs one
//! task per instrument. Inside a group every window read is its own task;
//! a request-wide semaphore bounds how many reads are in flight and each read
//! is cut off after the configured timeout. Collaborator failures end up as
//! skip tallies and warnings. Only invalid configuration and task panics
//! abort the request.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::aggregate::{
    AggregateResult, Aggregator, EventOutcome, EventSpan, GroupAccumulator, Rollup,
    RollupAccumulator,
};
use crate::config::AnalysisConfig;
use crate::metrics::{MetricComputer, MetricOutcome, SkipReason};
use crate::patterns::PatternDetector;
use crate::source::{EventCatalog, PriceSeriesAccess, SourceError};
use crate::surprise::{SurpriseClass, SurpriseClassifier};
use crate::window::{WindowExtractor, WindowSpec};
use crate::{AnalysisError, EventRecord, EventType, Instrument, UtcDateTime, ValidationError};

/// Half-open analysis period; `start` must precede `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPeriod {
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl AnalysisPeriod {
    pub fn new(start: UtcDateTime, end: UtcDateTime) -> Result<Self, ValidationError> {
        let period = Self { start, end };
        period.validate()?;
        Ok(period)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start >= self.end {
            return Err(ValidationError::InvalidPeriod);
        }
        Ok(())
    }
}

/// Which events a request analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EventSelection {
    /// Every catalog event of one type inside a period.
    ByType {
        event_type: EventType,
        period: AnalysisPeriod,
    },
    /// Specific release instants of one type.
    Explicit {
        event_type: EventType,
        dates: Vec<UtcDateTime>,
    },
}

impl EventSelection {
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::ByType { event_type, .. } | Self::Explicit { event_type, .. } => *event_type,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::ByType { period, .. } => period.validate(),
            Self::Explicit { dates, .. } if dates.is_empty() => {
                Err(ValidationError::EmptyEventDates)
            }
            Self::Explicit { .. } => Ok(()),
        }
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub selection: EventSelection,
    pub instruments: Vec<Instrument>,
    pub window_spec: WindowSpec,
    #[serde(default = "default_true")]
    pub include_low_confidence: bool,
    #[serde(default)]
    pub breakdown_by_surprise: bool,
    #[serde(default)]
    pub pattern_analysis: bool,
}

impl AnalysisRequest {
    pub fn new(
        selection: EventSelection,
        instruments: Vec<Instrument>,
        window_spec: WindowSpec,
    ) -> Self {
        Self {
            selection,
            instruments,
            window_spec,
            include_low_confidence: true,
            breakdown_by_surprise: false,
            pattern_analysis: false,
        }
    }

    pub fn include_low_confidence(mut self, include: bool) -> Self {
        self.include_low_confidence = include;
        self
    }

    pub fn with_surprise_breakdown(mut self) -> Self {
        self.breakdown_by_surprise = true;
        self
    }

    pub fn with_pattern_analysis(mut self) -> Self {
        self.pattern_analysis = true;
        self
    }

    /// Checks the request against `config` before anything is read.
    pub fn validate(&self, config: &AnalysisConfig) -> Result<(), ValidationError> {
        self.selection.validate()?;
        if self.instruments.is_empty() {
            return Err(ValidationError::EmptyInstruments);
        }
        self.window_spec.validate(config.max_window_bars)?;
        for instrument in &self.instruments {
            config.pip_scales.require(instrument)?;
        }
        Ok(())
    }
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub event_type: EventType,
    /// One entry per requested instrument, in request order.
    pub groups: Vec<AggregateResult>,
    pub rollup: Rollup,
    pub warnings: Vec<String>,
    /// First and last event analysed across all groups.
    pub period: Option<EventSpan>,
}

/// An event ready for extraction.
#[derive(Debug, Clone)]
struct PreparedEvent {
    sequence: usize,
    record: EventRecord,
    surprise: SurpriseClass,
}

/// Per-event context shared by the tasks of one group.
#[derive(Clone)]
struct GroupContext {
    prices: Arc<dyn PriceSeriesAccess>,
    semaphore: Arc<Semaphore>,
    extractor: WindowExtractor,
    computer: MetricComputer,
    instrument: Instrument,
    pip_size: f64,
    timeout: std::time::Duration,
}

/// Skip outcome plus the collaborator failure behind it, if any.
struct ReadOutcome {
    outcome: EventOutcome,
    failure: Option<SourceError>,
}

struct GroupRun {
    index: usize,
    accumulator: GroupAccumulator,
    warnings: Vec<String>,
}

/// Runs analysis requests against injected collaborators.
pub struct AnalysisEngine {
    prices: Arc<dyn PriceSeriesAccess>,
    catalog: Arc<dyn EventCatalog>,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    /// Builds an engine, rejecting an invalid configuration up front.
    pub fn new(
        prices: Arc<dyn PriceSeriesAccess>,
        catalog: Arc<dyn EventCatalog>,
        config: AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            prices,
            catalog,
            config,
        })
    }

    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        request.validate(&self.config)?;

        let event_type = request.selection.event_type();
        let mut warnings = Vec::new();
        let events = self.resolve_events(&request.selection, &mut warnings).await;

        let classifier = SurpriseClassifier::new(self.config.surprise);
        let events: Arc<Vec<PreparedEvent>> = Arc::new(
            events
                .into_iter()
                .enumerate()
                .map(|(sequence, record)| PreparedEvent {
                    sequence,
                    surprise: classifier.classify(record.actual, record.forecast),
                    record,
                })
                .collect(),
        );

        let aggregator = Aggregator::new(
            request.include_low_confidence,
            request.breakdown_by_surprise,
            request
                .pattern_analysis
                .then(|| PatternDetector::new(self.config.patterns)),
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_reads));

        let mut groups = JoinSet::new();
        for (index, instrument) in request.instruments.iter().enumerate() {
            let context = GroupContext {
                prices: Arc::clone(&self.prices),
                semaphore: Arc::clone(&semaphore),
                extractor: WindowExtractor::new(request.window_spec),
                computer: MetricComputer::new(self.config.metrics),
                instrument: instrument.clone(),
                pip_size: self.config.pip_scales.require(instrument)?,
                timeout: self.config.extraction_timeout_std(),
            };
            let events = Arc::clone(&events);
            groups.spawn(run_group(index, event_type, aggregator, context, events));
        }

        let mut runs = Vec::with_capacity(request.instruments.len());
        while let Some(joined) = groups.join_next().await {
            let run = joined
                .map_err(|error| AnalysisError::Internal(format!("group task failed: {error}")))??;
            runs.push(run);
        }
        runs.sort_by_key(|run| run.index);

        let mut rollup = RollupAccumulator::default();
        let mut period: Option<EventSpan> = None;
        let mut results = Vec::with_capacity(runs.len());
        for run in runs {
            warnings.extend(run.warnings);
            rollup.absorb(&run.accumulator);
            if let Some(span) = run.accumulator.span() {
                period = Some(period.map_or(span, |current| current.union(span)));
            }
            results.push(run.accumulator.finish());
        }

        Ok(AnalysisResult {
            event_type,
            groups: results,
            rollup: rollup.finish(),
            warnings,
            period,
        })
    }

    /// Events for the selection, ordered by timestamp.
    ///
    /// A failing catalog yields no events (or bare explicit events) plus a
    /// warning.
    async fn resolve_events(
        &self,
        selection: &EventSelection,
        warnings: &mut Vec<String>,
    ) -> Vec<EventRecord> {
        match selection {
            EventSelection::ByType { event_type, period } => {
                let mut events = self
                    .read_catalog(*event_type, period.start, period.end, warnings)
                    .await
                    .unwrap_or_default();
                events.retain(|event| event.timestamp < period.end);
                events.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
                events
            }
            EventSelection::Explicit { event_type, dates } => {
                let mut dates = dates.clone();
                dates.sort();
                dates.dedup();
                let (Some(first), Some(last)) = (dates.first().copied(), dates.last().copied())
                else {
                    return Vec::new();
                };

                let mut catalog: BTreeMap<UtcDateTime, Vec<EventRecord>> = BTreeMap::new();
                for event in self
                    .read_catalog(*event_type, first, last, warnings)
                    .await
                    .unwrap_or_default()
                {
                    catalog.entry(event.timestamp).or_default().push(event);
                }

                dates
                    .into_iter()
                    .flat_map(|date| {
                        catalog
                            .remove(&date)
                            .unwrap_or_else(|| vec![EventRecord::bare(*event_type, date)])
                    })
                    .collect()
            }
        }
    }

    async fn read_catalog(
        &self,
        event_type: EventType,
        start: UtcDateTime,
        end: UtcDateTime,
        warnings: &mut Vec<String>,
    ) -> Option<Vec<EventRecord>> {
        let read = self.catalog.get_events(event_type, start, end);
        match tokio::time::timeout(self.config.extraction_timeout_std(), read).await {
            Ok(Ok(events)) => Some(events),
            Ok(Err(error)) => {
                warn!(event_type = %event_type, error = %error, "event catalog read failed");
                warnings.push(format!("event catalog unavailable for {event_type}: {error}"));
                None
            }
            Err(_) => {
                warn!(event_type = %event_type, "event catalog read timed out");
                warnings.push(format!("event catalog read timed out for {event_type}"));
                None
            }
        }
    }
}

async fn run_group(
    index: usize,
    event_type: EventType,
    aggregator: Aggregator,
    context: GroupContext,
    events: Arc<Vec<PreparedEvent>>,
) -> Result<GroupRun, AnalysisError> {
    let mut reads = JoinSet::new();
    for event in events.iter().cloned() {
        reads.spawn(read_event(context.clone(), event));
    }

    let mut outcomes = Vec::with_capacity(events.len());
    let mut failures: BTreeMap<String, u64> = BTreeMap::new();
    let mut timed_out = 0_u64;
    while let Some(joined) = reads.join_next().await {
        let read = joined
            .map_err(|error| AnalysisError::Internal(format!("window read task failed: {error}")))?;
        if let Some(failure) = read.failure {
            *failures.entry(failure.to_string()).or_insert(0) += 1;
        }
        if read.outcome.outcome == MetricOutcome::Skipped(SkipReason::TimedOut) {
            timed_out += 1;
        }
        outcomes.push(read.outcome);
    }

    let instrument = context.instrument.clone();
    let mut warnings = Vec::new();
    for (message, count) in failures {
        warnings.push(format!(
            "{instrument}: {count} event(s) skipped, price data unavailable: {message}"
        ));
    }
    if timed_out > 0 {
        warnings.push(format!(
            "{instrument}: {timed_out} window read(s) timed out after {}s",
            context.timeout.as_secs_f64()
        ));
    }

    let accumulator = aggregator.fold(event_type, instrument, outcomes);
    let counts = accumulator.counts();
    info!(
        event_type = %event_type,
        instrument = %context.instrument,
        total = counts.total_events,
        skipped = counts.skipped,
        low_confidence = counts.low_confidence,
        normal = counts.normal,
        "group analysed"
    );

    Ok(GroupRun {
        index,
        accumulator,
        warnings,
    })
}

async fn read_event(context: GroupContext, event: PreparedEvent) -> ReadOutcome {
    let event_timestamp = event.record.timestamp;
    let sequence = event.sequence;
    let skipped = |reason, failure| ReadOutcome {
        outcome: EventOutcome {
            event_timestamp,
            sequence,
            outcome: MetricOutcome::Skipped(reason),
        },
        failure,
    };

    let Ok(_permit) = context.semaphore.acquire().await else {
        return skipped(
            SkipReason::DataUnavailable,
            Some(SourceError::internal("read pool closed")),
        );
    };

    let fetch = context
        .extractor
        .fetch(context.prices.as_ref(), &event.record, &context.instrument);
    match tokio::time::timeout(context.timeout, fetch).await {
        Ok(Ok(window)) => ReadOutcome {
            outcome: EventOutcome {
                event_timestamp,
                sequence,
                outcome: context
                    .computer
                    .compute(&window, event.surprise, context.pip_size),
            },
            failure: None,
        },
        Ok(Err(error)) => {
            warn!(
                instrument = %context.instrument,
                event = %event_timestamp,
                error = %error,
                "price read failed"
            );
            skipped(SkipReason::DataUnavailable, Some(error))
        }
        Err(_) => {
            warn!(
                instrument = %context.instrument,
                event = %event_timestamp,
                "price read timed out"
            );
            skipped(SkipReason::TimedOut, None)
        }
    }
}
