//! Shared fixtures for the workspace behavior tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use evimpact_core::source::SourceFuture;
use evimpact_core::{
    AnalysisConfig, AnalysisEngine, AnalysisPeriod, BarQuery, EventCatalog, EventRecord,
    EventSelection, EventType, Instrument, Interval, MemoryEventCatalog, MemoryPriceStore,
    PipScales, PriceBar, PriceSeriesAccess, UtcDateTime, WindowSpec,
};
use time::Duration;

pub fn ts(raw: &str) -> UtcDateTime {
    UtcDateTime::parse(raw).expect("valid timestamp")
}

pub fn pair(raw: &str) -> Instrument {
    Instrument::parse(raw).expect("valid pair")
}

pub fn eurusd() -> Instrument {
    pair("EUR/USD")
}

pub fn flat_bar(at: UtcDateTime, close: f64) -> PriceBar {
    PriceBar::new(at, close, close, close, close, None).expect("valid bar")
}

/// One bar per minute starting at `first`, one close per entry.
pub fn minute_bars(first: UtcDateTime, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .zip(0_i64..)
        .map(|(close, minute)| flat_bar(first.shift(Duration::minutes(minute)), *close))
        .collect()
}

pub fn nfp(at: &str, actual: f64, forecast: f64) -> EventRecord {
    EventRecord::new(
        EventType::Nfp,
        ts(at),
        Some(actual),
        Some(forecast),
        None,
        Some("USD"),
    )
    .expect("valid event")
}

pub fn window(pre_mins: i64, post_mins: i64, max_gap: u32) -> WindowSpec {
    WindowSpec::new(
        Duration::minutes(pre_mins),
        Duration::minutes(post_mins),
        Interval::OneMinute,
        max_gap,
    )
    .expect("valid window")
}

pub fn nfp_between(start: &str, end: &str) -> EventSelection {
    EventSelection::ByType {
        event_type: EventType::Nfp,
        period: AnalysisPeriod::new(ts(start), ts(end)).expect("valid period"),
    }
}

pub fn config_for(instruments: &[Instrument]) -> AnalysisConfig {
    AnalysisConfig {
        pip_scales: PipScales::forex_defaults(instruments),
        ..AnalysisConfig::default()
    }
}

pub fn store_with(series: Vec<(Instrument, Vec<PriceBar>)>) -> MemoryPriceStore {
    let mut store = MemoryPriceStore::new();
    for (instrument, bars) in series {
        store
            .insert_series(instrument, Interval::OneMinute, bars)
            .expect("ordered series");
    }
    store
}

pub fn catalog(events: Vec<EventRecord>) -> MemoryEventCatalog {
    MemoryEventCatalog::new(events).expect("valid catalog")
}

pub fn engine(
    prices: impl PriceSeriesAccess + 'static,
    events: impl EventCatalog + 'static,
    config: AnalysisConfig,
) -> AnalysisEngine {
    AnalysisEngine::new(Arc::new(prices), Arc::new(events), config).expect("valid engine")
}

/// Price source that counts reads before delegating.
pub struct CountingPrices<S> {
    inner: S,
    reads: Arc<AtomicUsize>,
}

impl<S> CountingPrices<S> {
    pub fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                reads: Arc::clone(&reads),
            },
            reads,
        )
    }
}

impl<S: PriceSeriesAccess> PriceSeriesAccess for CountingPrices<S> {
    fn get_bars<'a>(&'a self, query: BarQuery) -> SourceFuture<'a, Vec<PriceBar>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_bars(query)
    }
}

/// Price source that returns its series newest-first.
pub struct ReversedPrices(pub MemoryPriceStore);

impl PriceSeriesAccess for ReversedPrices {
    fn get_bars<'a>(&'a self, query: BarQuery) -> SourceFuture<'a, Vec<PriceBar>> {
        Box::pin(async move {
            let mut bars = self.0.get_bars(query).await?;
            bars.reverse();
            Ok(bars)
        })
    }
}

/// Price source that holds back one numbered read before delegating.
pub struct StaggeredPrices<S> {
    inner: S,
    slow_read: usize,
    delay: std::time::Duration,
    reads: AtomicUsize,
}

impl<S> StaggeredPrices<S> {
    pub fn new(inner: S, slow_read: usize, delay: std::time::Duration) -> Self {
        Self {
            inner,
            slow_read,
            delay,
            reads: AtomicUsize::new(0),
        }
    }
}

impl<S: PriceSeriesAccess> PriceSeriesAccess for StaggeredPrices<S> {
    fn get_bars<'a>(&'a self, query: BarQuery) -> SourceFuture<'a, Vec<PriceBar>> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if read == self.slow_read {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.get_bars(query).await
        })
    }
}
