//! Post-event path patterns.
//!
//! Patterns are read from each record's post-event path, anchored on its
//! reaction point (the first bar that crossed the reaction threshold).
//! Records that never reacted are not eligible.

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::domain::serde_seconds;
use crate::metrics::{Direction, MetricRecord, PathPoint};
use crate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Retracement is measured at this multiple of the reaction lag.
    pub retracement_lag_multiple: f64,
    /// Share of the peak excursion that must be given back.
    pub retracement_fraction: f64,
    /// How long after the reaction a reversal counts as a false breakout.
    #[serde(with = "serde_seconds")]
    pub false_breakout_window: Duration,
    /// Opposite moves smaller than this many pips are ignored.
    pub reversal_dead_zone_pips: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            retracement_lag_multiple: 3.0,
            retracement_fraction: 0.5,
            false_breakout_window: Duration::minutes(5),
            reversal_dead_zone_pips: 0.5,
        }
    }
}

impl PatternConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let field = "patterns.retracement_lag_multiple";
        if !self.retracement_lag_multiple.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
        if self.retracement_lag_multiple < 1.0 {
            return Err(ValidationError::OutOfRange {
                field,
                range: "[1, inf)",
            });
        }

        let field = "patterns.retracement_fraction";
        if !self.retracement_fraction.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
        if self.retracement_fraction <= 0.0 || self.retracement_fraction > 1.0 {
            return Err(ValidationError::OutOfRange {
                field,
                range: "(0, 1]",
            });
        }

        if !self.false_breakout_window.is_positive() {
            return Err(ValidationError::NonPositiveValue {
                field: "patterns.false_breakout_window",
            });
        }

        let field = "patterns.reversal_dead_zone_pips";
        if !self.reversal_dead_zone_pips.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
        if self.reversal_dead_zone_pips < 0.0 {
            return Err(ValidationError::NegativeValue { field });
        }
        Ok(())
    }
}

/// Hit count for one pattern over the eligible records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStat {
    pub eligible: u64,
    pub hits: u64,
    /// `hits / eligible`; `None` when nothing was eligible.
    pub frequency: Option<f64>,
}

impl PatternStat {
    fn from_counts(eligible: u64, hits: u64) -> Self {
        Self {
            eligible,
            hits,
            frequency: (eligible > 0).then(|| hits as f64 / eligible as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub retracement: PatternStat,
    pub false_breakout: PatternStat,
    pub trend_continuation: PatternStat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PatternDetector {
    config: PatternConfig,
}

impl PatternDetector {
    pub const fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, records: &[MetricRecord]) -> PatternStats {
        let mut retracement = (0_u64, 0_u64);
        let mut false_breakout = (0_u64, 0_u64);
        let mut continuation = (0_u64, 0_u64);

        for record in records {
            let Some(lag) = record.reaction_lag else {
                continue;
            };
            let lag_seconds = lag.whole_seconds();
            let Some(reaction) = record.path_point_at(lag_seconds) else {
                continue;
            };

            retracement.0 += 1;
            if self.retraces(record, lag_seconds) {
                retracement.1 += 1;
            }

            false_breakout.0 += 1;
            if self.reverses_early(record, reaction, lag_seconds) {
                false_breakout.1 += 1;
            }

            if record.direction != Direction::Flat {
                continuation.0 += 1;
                if record.direction.sign() == move_sign(reaction.move_pips) {
                    continuation.1 += 1;
                }
            }
        }

        PatternStats {
            retracement: PatternStat::from_counts(retracement.0, retracement.1),
            false_breakout: PatternStat::from_counts(false_breakout.0, false_breakout.1),
            trend_continuation: PatternStat::from_counts(continuation.0, continuation.1),
        }
    }

    /// Compares the move at `lag × multiple` with the peak reached up to that
    /// checkpoint. The checkpoint is never earlier than the path point after
    /// the reaction, so a zero lag still looks one bar ahead.
    fn retraces(&self, record: &MetricRecord, lag_seconds: i64) -> bool {
        let scaled = (lag_seconds as f64 * self.config.retracement_lag_multiple) as i64;
        let next_bar = record
            .post_path
            .iter()
            .map(|point| point.offset_seconds)
            .find(|offset| *offset > lag_seconds)
            .unwrap_or(lag_seconds);
        let checkpoint = scaled.max(next_bar);

        let reached = record
            .post_path
            .partition_point(|point| point.offset_seconds <= checkpoint);
        let Some(peak) = peak_point(&record.post_path[..reached]) else {
            return false;
        };
        let max_excursion = peak.move_pips.abs();
        if max_excursion <= 0.0 {
            return false;
        }
        let Some(later) = record.path_point_at(checkpoint) else {
            return false;
        };

        let side = f64::from(move_sign(peak.move_pips));
        max_excursion - side * later.move_pips
            >= self.config.retracement_fraction * max_excursion
    }

    fn reverses_early(&self, record: &MetricRecord, reaction: &PathPoint, lag_seconds: i64) -> bool {
        let early_sign = move_sign(reaction.move_pips);
        if early_sign == 0 {
            return false;
        }
        let horizon = lag_seconds + self.config.false_breakout_window.whole_seconds();

        record
            .post_path
            .iter()
            .filter(|point| point.offset_seconds > lag_seconds && point.offset_seconds <= horizon)
            .any(|point| {
                move_sign(point.move_pips) == -early_sign
                    && point.move_pips.abs() >= self.config.reversal_dead_zone_pips
            })
    }
}

fn move_sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// First path point with the largest absolute move.
fn peak_point(path: &[PathPoint]) -> Option<&PathPoint> {
    path.iter().fold(None, |best: Option<&PathPoint>, point| match best {
        Some(best) if best.move_pips.abs() >= point.move_pips.abs() => Some(best),
        _ => Some(point),
    })
}
