//! Per-group folding of metric outcomes into summary statistics.
//!
//! A group is one `(event_type, instrument)` pair. Outcomes are sorted by
//! event timestamp before folding so repeated runs produce identical output
//! regardless of the order concurrent reads completed in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::{Direction, MetricOutcome, MetricRecord, SkipReason};
use crate::patterns::{PatternDetector, PatternStats};
use crate::stats::{MetricSummary, RunningStats};
use crate::surprise::SurpriseClass;
use crate::{EventType, Instrument, SurprisePolarity, UtcDateTime};

/// Event-count bookkeeping. `total_events = skipped + low_confidence + normal`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub total_events: u64,
    pub skipped: u64,
    pub low_confidence: u64,
    pub normal: u64,
    /// Records that entered the statistics.
    pub included: u64,
}

impl GroupCounts {
    pub const fn reconciles(&self) -> bool {
        self.total_events == self.skipped + self.low_confidence + self.normal
    }

    fn merge(&mut self, other: &Self) {
        self.total_events += other.total_events;
        self.skipped += other.skipped;
        self.low_confidence += other.low_confidence;
        self.normal += other.normal;
        self.included += other.included;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionBias {
    pub bullish: u64,
    pub bearish: u64,
    pub flat: u64,
}

impl DirectionBias {
    fn push(&mut self, direction: Direction) {
        match direction {
            Direction::Bullish => self.bullish += 1,
            Direction::Bearish => self.bearish += 1,
            Direction::Flat => self.flat += 1,
        }
    }

    fn merge(&mut self, other: &Self) {
        self.bullish += other.bullish;
        self.bearish += other.bearish;
        self.flat += other.flat;
    }
}

/// Summary of every numeric metric; each tracks its own sample count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub movement_pips: MetricSummary,
    pub movement_percent: MetricSummary,
    pub pre_event_volatility: MetricSummary,
    pub post_event_volatility: MetricSummary,
    pub volatility_ratio: MetricSummary,
    pub reaction_lag_seconds: MetricSummary,
    pub max_excursion_pips: MetricSummary,
}

/// Running accumulators behind [`MetricStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricAccumulator {
    movement_pips: RunningStats,
    movement_percent: RunningStats,
    pre_event_volatility: RunningStats,
    post_event_volatility: RunningStats,
    volatility_ratio: RunningStats,
    reaction_lag_seconds: RunningStats,
    max_excursion_pips: RunningStats,
    direction_bias: DirectionBias,
}

impl MetricAccumulator {
    pub fn push(&mut self, record: &MetricRecord) {
        self.movement_pips.push(record.movement_pips);
        self.movement_percent.push(record.movement_percent);
        self.pre_event_volatility.push_opt(record.pre_event_volatility);
        self.post_event_volatility.push_opt(record.post_event_volatility);
        self.volatility_ratio.push_opt(record.volatility_ratio);
        self.reaction_lag_seconds
            .push_opt(record.reaction_lag.map(|lag| lag.as_seconds_f64()));
        self.max_excursion_pips.push(record.max_excursion);
        self.direction_bias.push(record.direction);
    }

    pub fn merge(&mut self, other: &Self) {
        self.movement_pips.merge(&other.movement_pips);
        self.movement_percent.merge(&other.movement_percent);
        self.pre_event_volatility.merge(&other.pre_event_volatility);
        self.post_event_volatility.merge(&other.post_event_volatility);
        self.volatility_ratio.merge(&other.volatility_ratio);
        self.reaction_lag_seconds.merge(&other.reaction_lag_seconds);
        self.max_excursion_pips.merge(&other.max_excursion_pips);
        self.direction_bias.merge(&other.direction_bias);
    }

    pub fn movement_pips(&self) -> &RunningStats {
        &self.movement_pips
    }

    pub const fn direction_bias(&self) -> DirectionBias {
        self.direction_bias
    }

    pub fn statistics(&self) -> MetricStatistics {
        MetricStatistics {
            movement_pips: self.movement_pips.summary(),
            movement_percent: self.movement_percent.summary(),
            pre_event_volatility: self.pre_event_volatility.summary(),
            post_event_volatility: self.post_event_volatility.summary(),
            volatility_ratio: self.volatility_ratio.summary(),
            reaction_lag_seconds: self.reaction_lag_seconds.summary(),
            max_excursion_pips: self.max_excursion_pips.summary(),
        }
    }
}

/// Statistics restricted to one surprise class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurpriseBucket {
    pub count: u64,
    pub direction_bias: DirectionBias,
    pub metrics: MetricStatistics,
}

/// How often the releasing economy's currency moved as its surprise implied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyStrength {
    pub currency: String,
    /// Records whose pair contains the currency.
    pub observed: u64,
    pub strengthened: u64,
    pub weakened: u64,
    pub aligned_with_surprise: u64,
    pub against_surprise: u64,
}

impl CurrencyStrength {
    fn push(&mut self, record: &MetricRecord) {
        let Some(currency_sign) = currency_side(&record.instrument, &self.currency) else {
            return;
        };
        self.observed += 1;

        let effect = record.direction.sign() * currency_sign;
        match effect {
            1 => self.strengthened += 1,
            -1 => self.weakened += 1,
            _ => return,
        }

        let Some(surprise_sign) = record.surprise_class.sign() else {
            return;
        };
        let polarity = match record.event_type.polarity() {
            SurprisePolarity::Direct => 1,
            SurprisePolarity::Inverse => -1,
        };
        if effect == surprise_sign * polarity {
            self.aligned_with_surprise += 1;
        } else {
            self.against_surprise += 1;
        }
    }
}

/// `+1` when `currency` is the pair's base, `-1` when it is the quote.
fn currency_side(instrument: &Instrument, currency: &str) -> Option<i8> {
    if instrument.base() == currency {
        Some(1)
    } else if instrument.quote() == currency {
        Some(-1)
    } else {
        None
    }
}

/// First and last event instants a group covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpan {
    pub first: UtcDateTime,
    pub last: UtcDateTime,
}

impl EventSpan {
    fn include(span: Option<Self>, at: UtcDateTime) -> Self {
        match span {
            Some(span) => Self {
                first: span.first.min(at),
                last: span.last.max(at),
            },
            None => Self {
                first: at,
                last: at,
            },
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }
}

/// Summary for one `(event_type, instrument)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub event_type: EventType,
    pub instrument: Instrument,
    pub period: Option<EventSpan>,
    pub counts: GroupCounts,
    pub skip_reasons: BTreeMap<SkipReason, u64>,
    pub metrics: MetricStatistics,
    pub direction_bias: DirectionBias,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surprise_breakdown: Option<BTreeMap<SurpriseClass, SurpriseBucket>>,
    pub currency_strength: Vec<CurrencyStrength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PatternStats>,
    /// Every computed record, low-confidence ones included, in event order.
    pub records: Vec<MetricRecord>,
}

/// One event's outcome for a group.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub event_timestamp: UtcDateTime,
    /// Position of the event in the resolved event list; breaks timestamp ties.
    pub sequence: usize,
    pub outcome: MetricOutcome,
}

/// Fold options shared by every group of a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    include_low_confidence: bool,
    breakdown_by_surprise: bool,
    patterns: Option<PatternDetector>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(true, false, None)
    }
}

impl Aggregator {
    pub const fn new(
        include_low_confidence: bool,
        breakdown_by_surprise: bool,
        patterns: Option<PatternDetector>,
    ) -> Self {
        Self {
            include_low_confidence,
            breakdown_by_surprise,
            patterns,
        }
    }

    /// Sorts `outcomes` by event time, then resolution order, and folds them
    /// into a fresh accumulator.
    pub fn fold(
        &self,
        event_type: EventType,
        instrument: Instrument,
        mut outcomes: Vec<EventOutcome>,
    ) -> GroupAccumulator {
        outcomes.sort_by(|left, right| {
            (left.event_timestamp, left.sequence).cmp(&(right.event_timestamp, right.sequence))
        });

        let mut group = GroupAccumulator::new(*self, event_type, instrument);
        for outcome in outcomes {
            group.push(outcome);
        }
        group
    }
}

/// Running state of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAccumulator {
    options: Aggregator,
    event_type: EventType,
    instrument: Instrument,
    span: Option<EventSpan>,
    counts: GroupCounts,
    skip_reasons: BTreeMap<SkipReason, u64>,
    metrics: MetricAccumulator,
    by_surprise: BTreeMap<SurpriseClass, (u64, MetricAccumulator)>,
    currency_strength: BTreeMap<String, CurrencyStrength>,
    records: Vec<MetricRecord>,
}

impl GroupAccumulator {
    pub fn new(options: Aggregator, event_type: EventType, instrument: Instrument) -> Self {
        Self {
            options,
            event_type,
            instrument,
            span: None,
            counts: GroupCounts::default(),
            skip_reasons: BTreeMap::new(),
            metrics: MetricAccumulator::default(),
            by_surprise: BTreeMap::new(),
            currency_strength: BTreeMap::new(),
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: EventOutcome) {
        self.counts.total_events += 1;
        self.span = Some(EventSpan::include(self.span, outcome.event_timestamp));

        match outcome.outcome {
            MetricOutcome::Skipped(reason) => {
                debug!(
                    instrument = %self.instrument,
                    event = %outcome.event_timestamp,
                    reason = %reason,
                    "event skipped"
                );
                self.counts.skipped += 1;
                *self.skip_reasons.entry(reason).or_insert(0) += 1;
            }
            MetricOutcome::Computed(record) => {
                if record.low_confidence {
                    self.counts.low_confidence += 1;
                } else {
                    self.counts.normal += 1;
                }

                if !record.low_confidence || self.options.include_low_confidence {
                    self.include(&record);
                }
                self.records.push(record);
            }
        }
    }

    fn include(&mut self, record: &MetricRecord) {
        self.counts.included += 1;
        self.metrics.push(record);

        if self.options.breakdown_by_surprise {
            let bucket = self.by_surprise.entry(record.surprise_class).or_default();
            bucket.0 += 1;
            bucket.1.push(record);
        }

        if let Some(currency) = &record.event_currency {
            self.currency_strength
                .entry(currency.clone())
                .or_insert_with(|| CurrencyStrength {
                    currency: currency.clone(),
                    ..CurrencyStrength::default()
                })
                .push(record);
        }
    }

    pub const fn counts(&self) -> GroupCounts {
        self.counts
    }

    pub const fn span(&self) -> Option<EventSpan> {
        self.span
    }

    pub const fn metrics(&self) -> &MetricAccumulator {
        &self.metrics
    }

    pub fn finish(self) -> AggregateResult {
        let patterns = self.options.patterns.map(|detector| {
            let included: Vec<MetricRecord> = self
                .records
                .iter()
                .filter(|record| !record.low_confidence || self.options.include_low_confidence)
                .cloned()
                .collect();
            detector.detect(&included)
        });

        let surprise_breakdown = self.options.breakdown_by_surprise.then(|| {
            self.by_surprise
                .iter()
                .map(|(class, (count, metrics))| {
                    (
                        *class,
                        SurpriseBucket {
                            count: *count,
                            direction_bias: metrics.direction_bias(),
                            metrics: metrics.statistics(),
                        },
                    )
                })
                .collect()
        });

        AggregateResult {
            event_type: self.event_type,
            instrument: self.instrument,
            period: self.span,
            counts: self.counts,
            skip_reasons: self.skip_reasons,
            metrics: self.metrics.statistics(),
            direction_bias: self.metrics.direction_bias(),
            surprise_breakdown,
            currency_strength: self.currency_strength.into_values().collect(),
            patterns,
            records: self.records,
        }
    }
}

/// Cross-instrument merge of every group in a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub groups: usize,
    pub counts: GroupCounts,
    pub direction_bias: DirectionBias,
    pub metrics: MetricStatistics,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollupAccumulator {
    groups: usize,
    counts: GroupCounts,
    metrics: MetricAccumulator,
}

impl RollupAccumulator {
    pub fn absorb(&mut self, group: &GroupAccumulator) {
        self.groups += 1;
        self.counts.merge(&group.counts);
        self.metrics.merge(&group.metrics);
    }

    pub fn finish(&self) -> Rollup {
        Rollup {
            groups: self.groups,
            counts: self.counts,
            direction_bias: self.metrics.direction_bias(),
            metrics: self.metrics.statistics(),
        }
    }
}
