//! Per-event, per-instrument impact metrics.
//!
//! Every price difference is taken against the reference close (the last
//! pre-event bar). Pip-denominated fields divide by the instrument's pip
//! size, so records from pairs quoted at different scales are comparable.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::domain::serde_seconds;
use crate::surprise::SurpriseClass;
use crate::window::ExtractedWindow;
use crate::{EventType, Instrument, PriceBar, UtcDateTime, ValidationError};

/// Thresholds used while computing a [`MetricRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Relative move from the reference close that counts as a reaction.
    pub reaction_threshold: f64,
    /// Net moves within this many pips are classified as flat.
    pub flat_dead_zone_pips: f64,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            reaction_threshold: 0.001,
            flat_dead_zone_pips: 0.5,
        }
    }
}

impl MetricConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let field = "metrics.reaction_threshold";
        if !self.reaction_threshold.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
        if self.reaction_threshold <= 0.0 {
            return Err(ValidationError::NonPositiveValue { field });
        }

        let field = "metrics.flat_dead_zone_pips";
        if !self.flat_dead_zone_pips.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
        if self.flat_dead_zone_pips < 0.0 {
            return Err(ValidationError::NegativeValue { field });
        }
        Ok(())
    }
}

/// Net price direction across the post-event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
    Flat,
}

impl Direction {
    pub fn from_pips(movement_pips: f64, dead_zone_pips: f64) -> Self {
        if movement_pips > dead_zone_pips {
            Self::Bullish
        } else if movement_pips < -dead_zone_pips {
            Self::Bearish
        } else {
            Self::Flat
        }
    }

    pub const fn sign(self) -> i8 {
        match self {
            Self::Bullish => 1,
            Self::Bearish => -1,
            Self::Flat => 0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Flat => "flat",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Move from the reference close at one post-event bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub offset_seconds: i64,
    pub move_pips: f64,
}

/// Why an event produced no metric record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyWindow,
    MissingReference,
    TimedOut,
    DataUnavailable,
}

impl SkipReason {
    pub const ALL: [Self; 4] = [
        Self::EmptyWindow,
        Self::MissingReference,
        Self::TimedOut,
        Self::DataUnavailable,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyWindow => "empty_window",
            Self::MissingReference => "missing_reference",
            Self::TimedOut => "timed_out",
            Self::DataUnavailable => "data_unavailable",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact of one event on one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub event_type: EventType,
    pub event_timestamp: UtcDateTime,
    pub instrument: Instrument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_currency: Option<String>,
    pub surprise_class: SurpriseClass,
    pub reference_close: f64,
    pub movement_pips: f64,
    pub movement_percent: f64,
    pub pre_event_volatility: Option<f64>,
    pub post_event_volatility: Option<f64>,
    pub volatility_ratio: Option<f64>,
    #[serde(with = "serde_seconds::option")]
    pub reaction_lag: Option<Duration>,
    /// Largest absolute post-event distance from the reference close, in pips.
    pub max_excursion: f64,
    pub direction: Direction,
    pub low_confidence: bool,
    pub post_path: Vec<PathPoint>,
}

impl MetricRecord {
    /// Path point at or immediately before `offset_seconds`.
    pub fn path_point_at(&self, offset_seconds: i64) -> Option<&PathPoint> {
        let index = self
            .post_path
            .partition_point(|point| point.offset_seconds <= offset_seconds);
        index.checked_sub(1).map(|index| &self.post_path[index])
    }
}

/// Result of computing metrics for one window.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    Computed(MetricRecord),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricComputer {
    config: MetricConfig,
}

impl MetricComputer {
    pub const fn new(config: MetricConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Computes the impact record for `window`.
    ///
    /// `pip_size` must be positive; the engine validates pip scales before
    /// any window is read.
    pub fn compute(
        &self,
        window: &ExtractedWindow,
        surprise_class: SurpriseClass,
        pip_size: f64,
    ) -> MetricOutcome {
        if window.is_empty() {
            return MetricOutcome::Skipped(SkipReason::EmptyWindow);
        }
        let Some(reference) = window.reference_bar() else {
            return MetricOutcome::Skipped(SkipReason::MissingReference);
        };
        let reference_close = reference.close;
        if reference_close <= 0.0 {
            return MetricOutcome::Skipped(SkipReason::MissingReference);
        }

        let event_time = window.event.timestamp;
        let post_bars = window.post_event_bars();
        let last_close = window.bars.last().map_or(reference_close, |bar| bar.close);

        let movement = last_close - reference_close;
        let movement_pips = movement / pip_size;
        let movement_percent = movement / reference_close * 100.0;

        let pre_event_volatility = return_volatility(window.pre_event_bars());
        let post_event_volatility = return_volatility(post_bars);

        let reaction_lag = post_bars
            .iter()
            .find(|bar| {
                ((bar.close - reference_close) / reference_close).abs()
                    > self.config.reaction_threshold
            })
            .map(|bar| bar.ts.since(event_time));

        let max_excursion = post_bars
            .iter()
            .map(|bar| (bar.close - reference_close).abs() / pip_size)
            .fold(0.0_f64, f64::max);

        let post_path = post_bars
            .iter()
            .map(|bar| PathPoint {
                offset_seconds: bar.ts.since(event_time).whole_seconds(),
                move_pips: (bar.close - reference_close) / pip_size,
            })
            .collect();

        MetricOutcome::Computed(MetricRecord {
            event_type: window.event.event_type,
            event_timestamp: event_time,
            instrument: window.instrument.clone(),
            event_currency: window.event.currency.clone(),
            surprise_class,
            reference_close,
            movement_pips,
            movement_percent,
            pre_event_volatility,
            post_event_volatility,
            volatility_ratio: volatility_ratio(pre_event_volatility, post_event_volatility),
            reaction_lag,
            max_excursion,
            direction: Direction::from_pips(movement_pips, self.config.flat_dead_zone_pips),
            low_confidence: !window.complete,
            post_path,
        })
    }
}

/// Population standard deviation of close-to-close returns.
///
/// `None` with fewer than two bars.
pub fn return_volatility(bars: &[PriceBar]) -> Option<f64> {
    if bars.len() < 2 {
        return None;
    }

    let returns: Vec<f64> = bars
        .windows(2)
        .filter(|pair| pair[0].close > 0.0)
        .map(|pair| (pair[1].close - pair[0].close) / pair[0].close)
        .collect();
    if returns.is_empty() {
        return None;
    }

    let count = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / count;
    let variance = returns
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;
    Some(variance.sqrt())
}

/// `post / pre`, undefined when either side is missing or `pre` is zero.
pub fn volatility_ratio(pre: Option<f64>, post: Option<f64>) -> Option<f64> {
    match (pre, post) {
        (Some(pre), Some(post)) if pre > 0.0 => Some(post / pre),
        _ => None,
    }
}
