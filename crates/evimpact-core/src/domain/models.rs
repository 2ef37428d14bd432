use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{UtcDateTime, ValidationError};

/// OHLC bar keyed by its start-of-bar timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl PriceBar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let bar = Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        };
        bar.validate()?;
        Ok(bar)
    }

    /// Re-checks invariants on bars that arrived through deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_non_negative("open", self.open)?;
        validate_non_negative("high", self.high)?;
        validate_non_negative("low", self.low)?;
        validate_non_negative("close", self.close)?;
        validate_optional_non_negative("volume", self.volume)?;

        if self.high < self.low {
            return Err(ValidationError::InvalidBarRange);
        }

        if self.open < self.low
            || self.open > self.high
            || self.close < self.low
            || self.close > self.high
        {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(())
    }
}

/// Checks that bars are strictly increasing in time.
pub fn ensure_strictly_increasing(bars: &[PriceBar]) -> Result<(), ValidationError> {
    for pair in bars.windows(2) {
        if pair[1].ts <= pair[0].ts {
            return Err(ValidationError::UnorderedBars {
                previous: pair[0].ts.to_string(),
                current: pair[1].ts.to_string(),
            });
        }
    }
    Ok(())
}

/// How a higher-than-forecast print moves the releasing economy's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurprisePolarity {
    /// Higher than expected strengthens the currency.
    Direct,
    /// Higher than expected weakens the currency.
    Inverse,
}

/// Scheduled release categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Nfp,
    Cpi,
    CoreCpi,
    Ppi,
    Gdp,
    RetailSales,
    UnemploymentRate,
    JoblessClaims,
    Pmi,
    InterestRate,
    Other,
}

impl EventType {
    pub const ALL: [Self; 11] = [
        Self::Nfp,
        Self::Cpi,
        Self::CoreCpi,
        Self::Ppi,
        Self::Gdp,
        Self::RetailSales,
        Self::UnemploymentRate,
        Self::JoblessClaims,
        Self::Pmi,
        Self::InterestRate,
        Self::Other,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nfp => "nfp",
            Self::Cpi => "cpi",
            Self::CoreCpi => "core_cpi",
            Self::Ppi => "ppi",
            Self::Gdp => "gdp",
            Self::RetailSales => "retail_sales",
            Self::UnemploymentRate => "unemployment_rate",
            Self::JoblessClaims => "jobless_claims",
            Self::Pmi => "pmi",
            Self::InterestRate => "interest_rate",
            Self::Other => "other",
        }
    }

    pub const fn polarity(self) -> SurprisePolarity {
        match self {
            Self::UnemploymentRate | Self::JoblessClaims => SurprisePolarity::Inverse,
            _ => SurprisePolarity::Direct,
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ValidationError::InvalidEventType {
                value: value.to_owned(),
            })
    }
}

/// Scheduled release with optional consensus and outcome values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: EventType,
    pub timestamp: UtcDateTime,
    #[serde(default)]
    pub actual: Option<f64>,
    #[serde(default)]
    pub forecast: Option<f64>,
    #[serde(default)]
    pub previous: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl EventRecord {
    pub fn new(
        event_type: EventType,
        timestamp: UtcDateTime,
        actual: Option<f64>,
        forecast: Option<f64>,
        previous: Option<f64>,
        currency: Option<&str>,
    ) -> Result<Self, ValidationError> {
        validate_optional_finite("actual", actual)?;
        validate_optional_finite("forecast", forecast)?;
        validate_optional_finite("previous", previous)?;

        Ok(Self {
            event_type,
            timestamp,
            actual,
            forecast,
            previous,
            currency: currency.map(validate_currency_code).transpose()?,
        })
    }

    /// Event with no released values; classifies as an unknown surprise.
    pub fn bare(event_type: EventType, timestamp: UtcDateTime) -> Self {
        Self {
            event_type,
            timestamp,
            actual: None,
            forecast: None,
            previous: None,
            currency: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_optional_finite("actual", self.actual)?;
        validate_optional_finite("forecast", self.forecast)?;
        validate_optional_finite("previous", self.previous)?;
        if let Some(currency) = &self.currency {
            validate_currency_code(currency)?;
        }
        Ok(())
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

fn validate_optional_finite(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteValue { field });
        }
    }
    Ok(())
}
