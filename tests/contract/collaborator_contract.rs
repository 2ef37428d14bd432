//! Contract tests for the collaborator traits.
//!
//! Every in-memory collaborator must honor the same read contract the engine
//! relies on: ordered bars inside inclusive bounds, empty ranges as empty
//! vectors and unknown series as `DataUnavailable`.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
use std::time::Duration;

use evimpact_core::{
    BarQuery, CachedPriceSeries, EventCatalog, EventRecord, EventType, Instrument, Interval,
    MemoryEventCatalog, MemoryPriceStore, PriceBar, PriceSeriesAccess, SourceErrorKind,
    UtcDateTime,
};

#[derive(Clone)]
struct PriceCase {
    name: &'static str,
    source: Arc<dyn PriceSeriesAccess>,
}

fn ts(raw: &str) -> UtcDateTime {
    UtcDateTime::parse(raw).expect("valid timestamp")
}

fn eurusd() -> Instrument {
    Instrument::parse("EUR/USD").expect("valid pair")
}

fn seeded_store() -> MemoryPriceStore {
    let bars = (0..60)
        .map(|minute| {
            let close = 1.1000 + f64::from(minute) * 0.0001;
            PriceBar::new(
                ts("2024-03-08T13:00:00Z").shift(time::Duration::minutes(i64::from(minute))),
                close,
                close + 0.0002,
                close - 0.0002,
                close,
                Some(100.0),
            )
            .expect("valid bar")
        })
        .collect();

    let mut store = MemoryPriceStore::new();
    store
        .insert_series(eurusd(), Interval::OneMinute, bars)
        .expect("ordered series");
    store
}

fn price_cases() -> Vec<PriceCase> {
    vec![
        PriceCase {
            name: "memory",
            source: Arc::new(seeded_store()),
        },
        PriceCase {
            name: "cached",
            source: Arc::new(CachedPriceSeries::new(
                seeded_store(),
                Duration::from_secs(60),
            )),
        },
    ]
}

fn query(start: &str, end: &str) -> BarQuery {
    BarQuery::new(eurusd(), Interval::OneMinute, ts(start), ts(end)).expect("valid query")
}

// =============================================================================
// Price series contract
// =============================================================================

#[test]
fn bars_are_strictly_increasing_and_within_bounds_for_all_sources() {
    // Given: A ten-minute query inside a seeded hour of bars
    let request = query("2024-03-08T13:10:00Z", "2024-03-08T13:20:00Z");

    for case in price_cases() {
        // When: Each source is read
        let bars = block_on(case.source.get_bars(request.clone()))
            .unwrap_or_else(|error| panic!("source '{}' failed: {error}", case.name));

        // Then: Both endpoints are included and ordering holds
        assert_eq!(bars.len(), 11, "source '{}': inclusive bounds", case.name);
        assert!(
            bars.windows(2).all(|pair| pair[0].ts < pair[1].ts),
            "source '{}': strict ordering",
            case.name
        );
        assert!(
            bars.iter()
                .all(|bar| bar.ts >= request.start && bar.ts <= request.end),
            "source '{}': bars inside the requested range",
            case.name
        );
    }
}

#[test]
fn empty_range_returns_no_bars_for_all_sources() {
    let request = query("2024-03-09T00:00:00Z", "2024-03-09T01:00:00Z");

    for case in price_cases() {
        let bars = block_on(case.source.get_bars(request.clone()))
            .unwrap_or_else(|error| panic!("source '{}' failed: {error}", case.name));
        assert!(bars.is_empty(), "source '{}': empty range", case.name);
    }
}

#[test]
fn unknown_series_is_data_unavailable_for_all_sources() {
    let unknown = BarQuery::new(
        Instrument::parse("AUD/NZD").expect("valid pair"),
        Interval::OneMinute,
        ts("2024-03-08T13:00:00Z"),
        ts("2024-03-08T14:00:00Z"),
    )
    .expect("valid query");

    for case in price_cases() {
        let error = block_on(case.source.get_bars(unknown.clone()))
            .expect_err("unknown series must fail");
        assert_eq!(
            error.kind(),
            SourceErrorKind::DataUnavailable,
            "source '{}': error kind",
            case.name
        );
        assert!(!error.code().is_empty());
    }
}

// =============================================================================
// Event catalog contract
// =============================================================================

#[test]
fn catalog_returns_only_requested_type_in_timestamp_order() {
    let catalog = MemoryEventCatalog::new(vec![
        EventRecord::bare(EventType::Nfp, ts("2024-04-05T12:30:00Z")),
        EventRecord::bare(EventType::Cpi, ts("2024-03-12T12:30:00Z")),
        EventRecord::bare(EventType::Nfp, ts("2024-03-08T13:30:00Z")),
        EventRecord::bare(EventType::Nfp, ts("2024-05-03T12:30:00Z")),
    ])
    .expect("valid catalog");

    let events = block_on(catalog.get_events(
        EventType::Nfp,
        ts("2024-03-08T13:30:00Z"),
        ts("2024-04-05T12:30:00Z"),
    ))
    .expect("catalog read");

    assert_eq!(events.len(), 2, "inclusive on both ends");
    assert!(events.iter().all(|event| event.event_type == EventType::Nfp));
    assert!(events.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[test]
fn catalog_normalizes_offset_timestamps_to_utc() {
    // 08:30 in New York (EST, UTC-5) is 13:30 UTC.
    let local = UtcDateTime::parse("2024-03-08T08:30:00-05:00").expect("offset timestamp");
    let catalog = MemoryEventCatalog::new(vec![EventRecord::bare(EventType::Nfp, local)])
        .expect("valid catalog");

    let events = block_on(catalog.get_events(
        EventType::Nfp,
        ts("2024-03-08T13:30:00Z"),
        ts("2024-03-08T13:30:00Z"),
    ))
    .expect("catalog read");

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].timestamp.to_string(), "2024-03-08T13:30:00Z");
}

// =============================================================================
// Helpers
// =============================================================================

fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    let waker = noop_waker();
    let mut context = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}

fn noop_waker() -> Waker {
    // SAFETY: The vtable functions never dereference the data pointer and are no-op operations.
    unsafe { Waker::from_raw(noop_raw_waker()) }
}

fn noop_raw_waker() -> RawWaker {
    RawWaker::new(std::ptr::null(), &NOOP_RAW_WAKER_VTABLE)
}

unsafe fn noop_raw_waker_clone(_: *const ()) -> RawWaker {
    noop_raw_waker()
}

unsafe fn noop_raw_waker_wake(_: *const ()) {}

unsafe fn noop_raw_waker_wake_by_ref(_: *const ()) {}

unsafe fn noop_raw_waker_drop(_: *const ()) {}

static NOOP_RAW_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(
    noop_raw_waker_clone,
    noop_raw_waker_wake,
    noop_raw_waker_wake_by_ref,
    noop_raw_waker_drop,
);
