use thiserror::Error;

/// Validation and configuration errors exposed by `evimpact-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("instrument cannot be empty")]
    EmptyInstrument,
    #[error("instrument must be BASE/QUOTE with two 3-letter codes: '{value}'")]
    InvalidInstrument { value: String },

    #[error("invalid interval '{value}', expected one of 1m, 5m, 15m, 30m, 1h, 1d")]
    InvalidInterval { value: String },
    #[error("invalid event type '{value}'")]
    InvalidEventType { value: String },

    #[error("unable to parse timestamp: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must lie in {range}")]
    OutOfRange {
        field: &'static str,
        range: &'static str,
    },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,
    #[error("bars must be strictly increasing in time: {previous} then {current}")]
    UnorderedBars { previous: String, current: String },

    #[error("duration '{field}' must be non-negative")]
    NegativeDuration { field: &'static str },
    #[error("window spans {bars} bars which exceeds the maximum of {max}")]
    WindowTooLarge { bars: u64, max: u64 },
    #[error("analysis period start must be before end")]
    InvalidPeriod,
    #[error("explicit event selection must contain at least one date")]
    EmptyEventDates,
    #[error("request must include at least one instrument")]
    EmptyInstruments,
    #[error("instrument '{instrument}' has no configured pip scale")]
    UnknownPipScale { instrument: String },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Errors that abort an analysis request.
///
/// Per-event failures never surface here; they become skip and
/// low-confidence bookkeeping on the group result.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ValidationError),

    #[error("analysis task failed: {0}")]
    Internal(String),
}

/// Top-level error type for loading fixtures and other I/O-bound helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
