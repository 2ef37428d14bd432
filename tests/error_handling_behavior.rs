//! Behavior-driven tests for error handling
//!
//! Invalid requests and configurations are rejected before any collaborator
//! is read. Collaborator failures never abort a request: they surface as
//! skip tallies and warnings on an otherwise successful result.

mod support;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use evimpact_core::{
    AnalysisEngine, AnalysisError, AnalysisPeriod, AnalysisRequest, EventSelection, EventType,
    MemoryEventCatalog, PipScales, PriceBar, SkipReason, ValidationError,
};
use support::*;

fn march_bars() -> Vec<PriceBar> {
    minute_bars(
        ts("2024-03-08T13:25:00Z"),
        &[
            1.1000, 1.1000, 1.1000, 1.1000, 1.1000, 1.1010, 1.1020, 1.1030, 1.1040, 1.1045,
            1.1045,
        ],
    )
}

fn march_request() -> AnalysisRequest {
    AnalysisRequest::new(
        nfp_between("2024-03-01T00:00:00Z", "2024-04-01T00:00:00Z"),
        vec![eurusd()],
        window(5, 5, 0),
    )
}

fn march_catalog() -> MemoryEventCatalog {
    catalog(vec![nfp("2024-03-08T13:30:00Z", 275.0, 200.0)])
}

// =============================================================================
// Error Handling: Rejected requests
// =============================================================================

#[tokio::test]
async fn when_pip_scale_is_missing_request_fails_before_any_read() {
    // Given: A configuration that knows EUR/USD but not GBP/USD
    let (prices, reads) = CountingPrices::new(store_with(vec![(eurusd(), march_bars())]));
    let engine = engine(prices, march_catalog(), config_for(&[eurusd()]));
    let request = AnalysisRequest::new(
        nfp_between("2024-03-01T00:00:00Z", "2024-04-01T00:00:00Z"),
        vec![eurusd(), pair("GBP/USD")],
        window(5, 5, 0),
    );

    // When: The request is analysed
    let error = engine.analyze(&request).await.expect_err("must fail");

    // Then: The error names the instrument and nothing was read
    assert!(matches!(
        error,
        AnalysisError::InvalidConfiguration(ValidationError::UnknownPipScale { ref instrument })
            if instrument == "GBP/USD"
    ));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn when_period_is_inverted_request_is_rejected() {
    // Given: A period whose start is after its end
    let engine = engine(
        store_with(vec![(eurusd(), march_bars())]),
        march_catalog(),
        config_for(&[eurusd()]),
    );
    let request = AnalysisRequest::new(
        EventSelection::ByType {
            event_type: EventType::Nfp,
            period: AnalysisPeriod {
                start: ts("2024-04-01T00:00:00Z"),
                end: ts("2024-03-01T00:00:00Z"),
            },
        },
        vec![eurusd()],
        window(5, 5, 0),
    );

    // When: The request is analysed
    let error = engine.analyze(&request).await.expect_err("must fail");

    // Then: An invalid period error is returned
    assert!(matches!(
        error,
        AnalysisError::InvalidConfiguration(ValidationError::InvalidPeriod)
    ));
}

#[tokio::test]
async fn when_no_instruments_or_dates_are_given_request_is_rejected() {
    // Given: An engine with valid configuration
    let engine = engine(
        store_with(vec![(eurusd(), march_bars())]),
        march_catalog(),
        config_for(&[eurusd()]),
    );

    // When: A request without instruments is analysed
    let no_instruments = AnalysisRequest::new(
        nfp_between("2024-03-01T00:00:00Z", "2024-04-01T00:00:00Z"),
        Vec::new(),
        window(5, 5, 0),
    );
    let error = engine.analyze(&no_instruments).await.expect_err("must fail");

    // Then: The empty instrument list is reported
    assert!(matches!(
        error,
        AnalysisError::InvalidConfiguration(ValidationError::EmptyInstruments)
    ));

    // And: An explicit selection without dates is reported too
    let no_dates = AnalysisRequest::new(
        EventSelection::Explicit {
            event_type: EventType::Nfp,
            dates: Vec::new(),
        },
        vec![eurusd()],
        window(5, 5, 0),
    );
    let error = engine.analyze(&no_dates).await.expect_err("must fail");
    assert!(matches!(
        error,
        AnalysisError::InvalidConfiguration(ValidationError::EmptyEventDates)
    ));
}

#[tokio::test]
async fn when_window_exceeds_configured_maximum_request_is_rejected() {
    // Given: A configuration that allows at most 10 bars per window
    let mut config = config_for(&[eurusd()]);
    config.max_window_bars = 10;
    let (prices, reads) = CountingPrices::new(store_with(vec![(eurusd(), march_bars())]));
    let engine = engine(prices, march_catalog(), config);

    // When: A 61-bar window is requested
    let request = AnalysisRequest::new(
        nfp_between("2024-03-01T00:00:00Z", "2024-04-01T00:00:00Z"),
        vec![eurusd()],
        window(30, 30, 0),
    );
    let error = engine.analyze(&request).await.expect_err("must fail");

    // Then: The window size and limit are reported
    assert!(matches!(
        error,
        AnalysisError::InvalidConfiguration(ValidationError::WindowTooLarge { bars: 61, max: 10 })
    ));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn when_configuration_is_invalid_engine_is_not_built() {
    // Given: A configuration allowing zero concurrent reads
    let mut config = config_for(&[eurusd()]);
    config.max_concurrent_reads = 0;

    // When: An engine is built
    let result = AnalysisEngine::new(
        Arc::new(store_with(Vec::new())),
        Arc::new(MemoryEventCatalog::default()),
        config,
    );

    // Then: Construction fails with the offending field
    let Err(error) = result else {
        panic!("engine must reject the configuration");
    };
    assert!(matches!(
        error,
        AnalysisError::InvalidConfiguration(ValidationError::NonPositiveValue {
            field: "max_concurrent_reads"
        })
    ));
}

#[test]
fn when_pip_scale_is_not_positive_configuration_is_rejected() {
    // Given: A configuration with a zero pip size
    let mut config = config_for(&[]);
    config.pip_scales = PipScales::from(BTreeMap::from([(eurusd(), 0.0)]));

    // When: The configuration is validated
    let error = config.validate().expect_err("must fail");

    // Then: A non-positive value error is returned
    assert!(matches!(error, ValidationError::NonPositiveValue { .. }));
}

// =============================================================================
// Error Handling: Collaborator failures
// =============================================================================

#[tokio::test]
async fn when_price_reads_are_slow_events_are_skipped_as_timed_out() {
    // Given: A price store slower than the extraction timeout
    let mut config = config_for(&[eurusd()]);
    config.extraction_timeout = time::Duration::milliseconds(20);
    let prices = store_with(vec![(eurusd(), march_bars())])
        .with_latency(std::time::Duration::from_millis(500));
    let engine = engine(prices, march_catalog(), config);

    // When: The release is analysed
    let result = engine.analyze(&march_request()).await.expect("analysis");

    // Then: The event is skipped as timed out and a warning is raised
    let group = &result.groups[0];
    assert_eq!(group.counts.total_events, 1);
    assert_eq!(group.counts.skipped, 1);
    assert_eq!(group.skip_reasons.get(&SkipReason::TimedOut), Some(&1));
    assert!(group.records.is_empty());
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.contains("EUR/USD") && warning.contains("timed out")));
}

#[tokio::test]
async fn when_series_is_unknown_events_are_skipped_as_unavailable() {
    // Given: A pip scale for GBP/USD but no GBP/USD price history
    let engine = engine(
        store_with(vec![(eurusd(), march_bars())]),
        march_catalog(),
        config_for(&[eurusd(), pair("GBP/USD")]),
    );
    let request = AnalysisRequest::new(
        nfp_between("2024-03-01T00:00:00Z", "2024-04-01T00:00:00Z"),
        vec![eurusd(), pair("GBP/USD")],
        window(5, 5, 0),
    );

    // When: Both instruments are analysed
    let result = engine.analyze(&request).await.expect("analysis");

    // Then: EUR/USD is measured while GBP/USD reports unavailable data
    assert_eq!(result.groups[0].counts.normal, 1);
    let gbp = &result.groups[1];
    assert_eq!(gbp.counts.skipped, 1);
    assert_eq!(gbp.skip_reasons.get(&SkipReason::DataUnavailable), Some(&1));
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.starts_with("GBP/USD") && warning.contains("unavailable")));

    // And: The rollup still reconciles across both groups
    assert!(result.rollup.counts.reconciles());
    assert_eq!(result.rollup.counts.skipped, 1);
}

#[tokio::test]
async fn when_source_breaks_ordering_contract_event_is_skipped() {
    // Given: A source that returns bars newest-first
    let engine = engine(
        ReversedPrices(store_with(vec![(eurusd(), march_bars())])),
        march_catalog(),
        config_for(&[eurusd()]),
    );

    // When: The release is analysed
    let result = engine.analyze(&march_request()).await.expect("analysis");

    // Then: The window is rejected rather than repaired
    let group = &result.groups[0];
    assert_eq!(group.skip_reasons.get(&SkipReason::DataUnavailable), Some(&1));
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.contains("ordering contract")));
}

#[tokio::test]
async fn when_catalog_is_unavailable_result_is_empty_with_warning() {
    // Given: An event catalog that is offline
    let engine = engine(
        store_with(vec![(eurusd(), march_bars())]),
        MemoryEventCatalog::unavailable("calendar offline"),
        config_for(&[eurusd()]),
    );

    // When: A period is analysed
    let result = engine.analyze(&march_request()).await.expect("analysis");

    // Then: No events are analysed and the outage is reported
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].counts.total_events, 0);
    assert!(result.period.is_none());
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.contains("calendar offline")));
}

#[tokio::test]
async fn when_catalog_is_slow_read_times_out_with_warning() {
    // Given: An event catalog slower than the extraction timeout
    let mut config = config_for(&[eurusd()]);
    config.extraction_timeout = time::Duration::milliseconds(20);
    let engine = engine(
        store_with(vec![(eurusd(), march_bars())]),
        march_catalog().with_latency(std::time::Duration::from_millis(500)),
        config,
    );

    // When: A period is analysed
    let result = engine.analyze(&march_request()).await.expect("analysis");

    // Then: The request completes without events and explains why
    assert_eq!(result.groups[0].counts.total_events, 0);
    assert!(result
        .warnings
        .iter()
        .any(|warning| warning.contains("event catalog read timed out")));
}

#[tokio::test]
async fn when_catalog_is_unavailable_explicit_dates_are_still_measured() {
    // Given: An offline catalog and an explicit release instant
    let engine = engine(
        store_with(vec![(eurusd(), march_bars())]),
        MemoryEventCatalog::unavailable("calendar offline"),
        config_for(&[eurusd()]),
    );
    let request = AnalysisRequest::new(
        EventSelection::Explicit {
            event_type: EventType::Nfp,
            dates: vec![ts("2024-03-08T13:30:00Z")],
        },
        vec![eurusd()],
        window(5, 5, 0),
    );

    // When: The explicit date is analysed
    let result = engine.analyze(&request).await.expect("analysis");

    // Then: The window is measured without surprise data and the outage is reported
    assert_eq!(result.groups[0].counts.normal, 1);
    assert!(!result.warnings.is_empty());
}
