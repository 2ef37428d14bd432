//! Collaborator contracts consumed by the engine.
//!
//! The engine never fetches, scrapes or caches on its own. Price bars and
//! event records arrive through the two read-only traits below, which may be
//! arbitrarily slow and may fail; the engine turns their failures into skip
//! bookkeeping rather than aborting a request.
//!
//! | Trait | Method | Returns |
//! |-------|--------|---------|
//! | [`PriceSeriesAccess`] | [`get_bars`](PriceSeriesAccess::get_bars) | ordered [`PriceBar`]s |
//! | [`EventCatalog`] | [`get_events`](EventCatalog::get_events) | ordered [`EventRecord`]s |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{EventRecord, EventType, Instrument, Interval, PriceBar, UtcDateTime};

/// Collaborator error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// The series or catalog cannot be supplied.
    DataUnavailable,
    InvalidRequest,
    Internal,
}

/// Structured collaborator error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::DataUnavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn unknown_series(instrument: &Instrument, interval: Interval) -> Self {
        Self {
            kind: SourceErrorKind::DataUnavailable,
            message: format!("no {interval} series for instrument '{instrument}'"),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::DataUnavailable => "source.data_unavailable",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Inclusive time range query for one instrument series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarQuery {
    pub instrument: Instrument,
    pub interval: Interval,
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl BarQuery {
    pub fn new(
        instrument: Instrument,
        interval: Interval,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> Result<Self, SourceError> {
        if end < start {
            return Err(SourceError::invalid_request(
                "bar query end must not precede start",
            ));
        }
        Ok(Self {
            instrument,
            interval,
            start,
            end,
        })
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Read-only access to per-instrument, per-interval price history.
///
/// # Contract
///
/// - Bars are returned in strictly increasing timestamp order, each with
///   `start <= ts <= end`.
/// - An unknown instrument/interval fails with
///   [`SourceErrorKind::DataUnavailable`].
/// - A known series with no bars in range returns an empty vector.
///
/// Implementations must be `Send + Sync`; the engine shares one handle
/// across every concurrent group.
pub trait PriceSeriesAccess: Send + Sync {
    fn get_bars<'a>(&'a self, query: BarQuery) -> SourceFuture<'a, Vec<PriceBar>>;
}

/// Read-only access to scheduled event records.
///
/// Returns events of `event_type` with `start <= timestamp <= end`, ordered
/// by timestamp.
pub trait EventCatalog: Send + Sync {
    fn get_events<'a>(
        &'a self,
        event_type: EventType,
        start: UtcDateTime,
        end: UtcDateTime,
    ) -> SourceFuture<'a, Vec<EventRecord>>;
}
