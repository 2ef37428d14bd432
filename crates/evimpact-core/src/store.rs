//! In-memory reference collaborators.
//!
//! [`MemoryPriceStore`] and [`MemoryEventCatalog`] implement the collaborator
//! traits over validated fixtures. They back the CLI (loaded from JSON files)
//! and the test suites, and can inject an artificial read latency to exercise
//! timeout handling.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domain::ensure_strictly_increasing;
use crate::source::{BarQuery, EventCatalog, PriceSeriesAccess, SourceError, SourceFuture};
use crate::{
    CoreError, EventRecord, EventType, Instrument, Interval, PriceBar, UtcDateTime,
    ValidationError,
};

/// Price history keyed by `(instrument, interval)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryPriceStore {
    series: HashMap<(Instrument, Interval), Vec<PriceBar>>,
    latency: Option<Duration>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Registers a series, rejecting invalid, duplicate or out-of-order bars.
    pub fn insert_series(
        &mut self,
        instrument: Instrument,
        interval: Interval,
        bars: Vec<PriceBar>,
    ) -> Result<(), ValidationError> {
        for bar in &bars {
            bar.validate()?;
        }
        ensure_strictly_increasing(&bars)?;
        self.series.insert((instrument, interval), bars);
        Ok(())
    }

    pub fn series_len(&self, instrument: &Instrument, interval: Interval) -> Option<usize> {
        self.series
            .get(&(instrument.clone(), interval))
            .map(Vec::len)
    }

    fn range(&self, query: &BarQuery) -> Result<Vec<PriceBar>, SourceError> {
        let bars = self
            .series
            .get(&(query.instrument.clone(), query.interval))
            .ok_or_else(|| SourceError::unknown_series(&query.instrument, query.interval))?;

        let from = bars.partition_point(|bar| bar.ts < query.start);
        let to = bars.partition_point(|bar| bar.ts <= query.end);
        Ok(bars[from..to.max(from)].to_vec())
    }
}

impl PriceSeriesAccess for MemoryPriceStore {
    fn get_bars<'a>(&'a self, query: BarQuery) -> SourceFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.range(&query)
        })
    }
}

/// Event catalog over a timestamp-ordered list.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventCatalog {
    events: Vec<EventRecord>,
    latency: Option<Duration>,
    outage: Option<String>,
}

impl MemoryEventCatalog {
    pub fn new(events: Vec<EventRecord>) -> Result<Self, ValidationError> {
        let mut catalog = Self::default();
        catalog.extend(events)?;
        Ok(catalog)
    }

    /// Catalog whose every read fails as unavailable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            outage: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn extend(&mut self, events: Vec<EventRecord>) -> Result<(), ValidationError> {
        for event in &events {
            event.validate()?;
        }
        self.events.extend(events);
        self.events
            .sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventCatalog for MemoryEventCatalog {
    fn get_events<'a>(
        &'a self,
        event_type: EventType,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> SourceFuture<'a, Vec<EventRecord>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if let Some(message) = &self.outage {
                return Err(SourceError::data_unavailable(message.clone()));
            }

            Ok(self
                .events
                .iter()
                .filter(|event| {
                    event.event_type == event_type
                        && event.timestamp >= start
                        && event.timestamp <= end
                })
                .cloned()
                .collect())
        })
    }
}

/// Reads a JSON array of bars.
pub fn load_bars_json(path: &Path) -> Result<Vec<PriceBar>, CoreError> {
    let raw = fs::read_to_string(path)?;
    let bars: Vec<PriceBar> = serde_json::from_str(&raw)?;
    for bar in &bars {
        bar.validate()?;
    }
    Ok(bars)
}

/// Reads a JSON array of event records.
pub fn load_events_json(path: &Path) -> Result<Vec<EventRecord>, CoreError> {
    let raw = fs::read_to_string(path)?;
    let events: Vec<EventRecord> = serde_json::from_str(&raw)?;
    for event in &events {
        event.validate()?;
    }
    Ok(events)
}
