//! Event-aligned window extraction.
//!
//! A window is the slice of bars in `[event − pre, event + post]` for one
//! instrument. Bars strictly before the event form the pre-event side; a bar
//! starting exactly at the event instant belongs to the post-event side. The
//! pre-event reference bar is the last pre-event bar.
//!
//! Missing data never discards a window. Oversized gaps, a missing reference
//! bar or an empty post-event side only clear the `complete` flag; the
//! metric stage decides what that means.

use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::warn;

use crate::domain::{ensure_strictly_increasing, serde_seconds};
use crate::source::{BarQuery, PriceSeriesAccess, SourceError};
use crate::{EventRecord, Instrument, Interval, PriceBar, ValidationError};

/// Pre/post spans around an event plus the bar granularity and gap policy.
///
/// Durations serialize as whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(with = "serde_seconds")]
    pub pre_duration: Duration,
    #[serde(with = "serde_seconds")]
    pub post_duration: Duration,
    pub interval: Interval,
    /// Largest run of consecutive missing bars tolerated between two bars.
    pub max_gap_tolerance: u32,
}

impl WindowSpec {
    pub fn new(
        pre_duration: Duration,
        post_duration: Duration,
        interval: Interval,
        max_gap_tolerance: u32,
    ) -> Result<Self, ValidationError> {
        let spec = Self {
            pre_duration,
            post_duration,
            interval,
            max_gap_tolerance,
        };
        spec.validate_durations()?;
        Ok(spec)
    }

    pub fn validate_durations(&self) -> Result<(), ValidationError> {
        if self.pre_duration.is_negative() {
            return Err(ValidationError::NegativeDuration {
                field: "pre_duration",
            });
        }
        if self.post_duration.is_negative() {
            return Err(ValidationError::NegativeDuration {
                field: "post_duration",
            });
        }
        Ok(())
    }

    /// Number of bar slots the full window spans; `None` when the combined
    /// span does not fit in a `Duration`.
    pub fn span_bars(&self) -> Option<u64> {
        let total = self.pre_duration.checked_add(self.post_duration)?.whole_seconds();
        Some(u64::try_from(total / self.interval.seconds()).unwrap_or(0) + 1)
    }

    pub fn validate(&self, max_window_bars: u64) -> Result<(), ValidationError> {
        self.validate_durations()?;
        let bars = self.span_bars().unwrap_or(u64::MAX);
        if bars > max_window_bars {
            return Err(ValidationError::WindowTooLarge {
                bars,
                max: max_window_bars,
            });
        }
        Ok(())
    }
}

/// Bars found around one event for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedWindow {
    pub event: EventRecord,
    pub instrument: Instrument,
    pub interval: Interval,
    pub bars: Vec<PriceBar>,
    /// Index of the first bar at or after the event instant.
    first_post_index: usize,
    /// Largest run of missing bars between consecutive bars.
    pub max_gap_bars: u64,
    pub complete: bool,
}

impl ExtractedWindow {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn reference_bar(&self) -> Option<&PriceBar> {
        self.first_post_index
            .checked_sub(1)
            .and_then(|index| self.bars.get(index))
    }

    pub fn pre_event_bars(&self) -> &[PriceBar] {
        &self.bars[..self.first_post_index]
    }

    pub fn post_event_bars(&self) -> &[PriceBar] {
        &self.bars[self.first_post_index..]
    }
}

/// Aligns price bars to events according to a [`WindowSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowExtractor {
    spec: WindowSpec,
}

impl WindowExtractor {
    pub const fn new(spec: WindowSpec) -> Self {
        Self { spec }
    }

    pub const fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Query covering the window of `event` for `instrument`.
    pub fn query_for(
        &self,
        event: &EventRecord,
        instrument: &Instrument,
    ) -> Result<BarQuery, SourceError> {
        BarQuery::new(
            instrument.clone(),
            self.spec.interval,
            event.timestamp.shift(-self.spec.pre_duration),
            event.timestamp.shift(self.spec.post_duration),
        )
    }

    /// Reads the window from the collaborator and aligns it.
    ///
    /// A collaborator that violates the ordering contract is reported as
    /// unavailable rather than repaired.
    pub async fn fetch(
        &self,
        access: &dyn PriceSeriesAccess,
        event: &EventRecord,
        instrument: &Instrument,
    ) -> Result<ExtractedWindow, SourceError> {
        let query = self.query_for(event, instrument)?;
        let bars = access.get_bars(query).await?;

        if let Err(violation) = ensure_strictly_increasing(&bars) {
            warn!(
                instrument = %instrument,
                event = %event.timestamp,
                error = %violation,
                "price source returned unordered bars"
            );
            return Err(SourceError::data_unavailable(format!(
                "price source for '{instrument}' broke ordering contract: {violation}"
            )));
        }

        Ok(self.extract(event, instrument, bars))
    }

    /// Aligns already-fetched, strictly increasing bars to `event`.
    pub fn extract(
        &self,
        event: &EventRecord,
        instrument: &Instrument,
        bars: Vec<PriceBar>,
    ) -> ExtractedWindow {
        let start = event.timestamp.shift(-self.spec.pre_duration);
        let end = event.timestamp.shift(self.spec.post_duration);

        let bars: Vec<PriceBar> = bars
            .into_iter()
            .filter(|bar| bar.ts >= start && bar.ts <= end)
            .collect();

        let first_post_index = bars.partition_point(|bar| bar.ts < event.timestamp);
        let max_gap_bars = max_missing_bars(&bars, self.spec.interval);

        let has_reference = first_post_index > 0;
        let has_post = first_post_index < bars.len();
        let complete = has_reference
            && has_post
            && max_gap_bars <= u64::from(self.spec.max_gap_tolerance);

        ExtractedWindow {
            event: event.clone(),
            instrument: instrument.clone(),
            interval: self.spec.interval,
            bars,
            first_post_index,
            max_gap_bars,
            complete,
        }
    }
}

/// Largest number of whole bar slots missing between consecutive bars.
fn max_missing_bars(bars: &[PriceBar], interval: Interval) -> u64 {
    let step = interval.seconds();
    bars.windows(2)
        .map(|pair| {
            let elapsed = pair[1].ts.since(pair[0].ts).whole_seconds();
            u64::try_from(elapsed / step - 1).unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}
