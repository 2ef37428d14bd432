//! # Domain Models
//!
//! Canonical domain types shared by every stage of the analysis pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PriceBar`] | OHLC bar keyed by start-of-bar timestamp |
//! | [`EventRecord`] | Scheduled release with actual/forecast/previous values |
//! | [`EventType`] | Closed set of release categories |
//! | [`SurprisePolarity`] | Currency meaning of a higher-than-forecast print |
//! | [`Instrument`] | Validated `BASE/QUOTE` currency pair |
//! | [`Interval`] | Bar granularity (1m .. 1d) |
//! | [`UtcDateTime`] | Instant normalized to UTC |
//!
//! ## Validation
//!
//! Constructors enforce invariants, and deserialized values can be re-checked
//! with `validate()`:
//!
//! ```rust
//! use evimpact_core::{PriceBar, UtcDateTime, ValidationError};
//!
//! let ts = UtcDateTime::parse("2024-01-05T13:30:00Z").unwrap();
//! assert!(PriceBar::new(ts, 1.0950, 1.0962, 1.0941, 1.0958, None).is_ok());
//!
//! let inverted = PriceBar::new(ts, 1.0950, 1.0941, 1.0962, 1.0958, None);
//! assert!(matches!(inverted, Err(ValidationError::InvalidBarRange)));
//! ```

mod instrument;
mod interval;
mod models;
mod timestamp;

pub use instrument::Instrument;
pub use interval::Interval;
pub use models::{
    ensure_strictly_increasing, validate_currency_code, EventRecord, EventType, PriceBar,
    SurprisePolarity,
};
pub use timestamp::{serde_seconds, UtcDateTime};
