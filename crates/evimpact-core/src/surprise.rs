//! Actual-versus-forecast surprise classification.
//!
//! The classifier is type-agnostic: it only says whether a print came in
//! above, below or in line with consensus. What "above" means for a
//! currency is decided later from [`EventType::polarity`](crate::EventType::polarity).

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Outcome of comparing an event's actual value with its forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurpriseClass {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

impl SurpriseClass {
    pub const ALL: [Self; 4] = [Self::Positive, Self::Negative, Self::Neutral, Self::Unknown];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Unknown => "unknown",
        }
    }

    /// `+1` / `-1` for directional surprises.
    pub const fn sign(self) -> Option<i8> {
        match self {
            Self::Positive => Some(1),
            Self::Negative => Some(-1),
            Self::Neutral | Self::Unknown => None,
        }
    }
}

impl Display for SurpriseClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tolerances separating in-line prints from directional surprises.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurpriseConfig {
    /// Fraction of `|forecast|` within which a print counts as neutral.
    pub relative_tolerance: f64,
    /// Absolute band used instead when the forecast is exactly zero.
    pub zero_forecast_tolerance: f64,
}

impl Default for SurpriseConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: 0.02,
            zero_forecast_tolerance: 1e-9,
        }
    }
}

impl SurpriseConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        non_negative_finite("surprise.relative_tolerance", self.relative_tolerance)?;
        non_negative_finite(
            "surprise.zero_forecast_tolerance",
            self.zero_forecast_tolerance,
        )
    }
}

fn non_negative_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurpriseClassifier {
    config: SurpriseConfig,
}

impl SurpriseClassifier {
    pub const fn new(config: SurpriseConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, actual: Option<f64>, forecast: Option<f64>) -> SurpriseClass {
        let (Some(actual), Some(forecast)) = (actual, forecast) else {
            return SurpriseClass::Unknown;
        };
        if !actual.is_finite() || !forecast.is_finite() {
            return SurpriseClass::Unknown;
        }

        let band = if forecast == 0.0 {
            self.config.zero_forecast_tolerance
        } else {
            self.config.relative_tolerance * forecast.abs()
        };

        let difference = actual - forecast;
        if difference.abs() <= band {
            SurpriseClass::Neutral
        } else if difference > 0.0 {
            SurpriseClass::Positive
        } else {
            SurpriseClass::Negative
        }
    }
}
