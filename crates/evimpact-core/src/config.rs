//! Analysis configuration.
//!
//! Defaults cover every threshold; `EVIMPACT_*` environment variables
//! override individual values and a JSON file can override any field.
//! Pip scales are never inferred: each requested instrument needs an explicit
//! entry, or the caller opts into [`PipScales::forex_defaults`].

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::domain::serde_seconds;
use crate::metrics::MetricConfig;
use crate::patterns::PatternConfig;
use crate::surprise::SurpriseConfig;
use crate::{Instrument, ValidationError};

/// Pip size per instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipScales(BTreeMap<Instrument, f64>);

impl PipScales {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventional forex pip sizes: `0.01` for JPY-quoted pairs, `0.0001`
    /// otherwise.
    pub fn forex_defaults<'a>(instruments: impl IntoIterator<Item = &'a Instrument>) -> Self {
        instruments
            .into_iter()
            .map(|instrument| {
                let pip = if instrument.quote() == "JPY" { 0.01 } else { 0.0001 };
                (instrument.clone(), pip)
            })
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    pub fn insert(&mut self, instrument: Instrument, pip_size: f64) -> Result<(), ValidationError> {
        validate_pip_size(pip_size)?;
        self.0.insert(instrument, pip_size);
        Ok(())
    }

    pub fn with(mut self, instrument: Instrument, pip_size: f64) -> Result<Self, ValidationError> {
        self.insert(instrument, pip_size)?;
        Ok(self)
    }

    pub fn get(&self, instrument: &Instrument) -> Option<f64> {
        self.0.get(instrument).copied()
    }

    pub fn require(&self, instrument: &Instrument) -> Result<f64, ValidationError> {
        self.get(instrument)
            .ok_or_else(|| ValidationError::UnknownPipScale {
                instrument: instrument.to_string(),
            })
    }

    /// Entries from `other` replace existing ones.
    pub fn extend(&mut self, other: PipScales) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.0.values().copied().try_for_each(validate_pip_size)
    }
}

impl From<BTreeMap<Instrument, f64>> for PipScales {
    fn from(value: BTreeMap<Instrument, f64>) -> Self {
        Self(value)
    }
}

fn validate_pip_size(pip_size: f64) -> Result<(), ValidationError> {
    let field = "pip_scales";
    if !pip_size.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if pip_size <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

/// Every tunable of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub surprise: SurpriseConfig,
    pub metrics: MetricConfig,
    pub patterns: PatternConfig,
    pub pip_scales: PipScales,
    /// Window reads in flight across the whole request.
    pub max_concurrent_reads: usize,
    /// Upper bound on a single window read, in seconds when serialized.
    #[serde(with = "serde_seconds")]
    pub extraction_timeout: Duration,
    /// Largest window, in bar slots, a request may ask for.
    pub max_window_bars: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            surprise: SurpriseConfig::default(),
            metrics: MetricConfig::default(),
            patterns: PatternConfig::default(),
            pip_scales: PipScales::default(),
            max_concurrent_reads: 8,
            extraction_timeout: Duration::seconds(30),
            max_window_bars: 10_000,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overridden by `EVIMPACT_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    /// Applies overrides from `lookup`; unset or unparsable values keep the
    /// current setting.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |name: &str| -> Option<f64> { parse_var(&lookup, name) };

        if let Some(value) = parsed("EVIMPACT_SURPRISE_TOLERANCE") {
            self.surprise.relative_tolerance = value;
        }
        if let Some(value) = parsed("EVIMPACT_REACTION_THRESHOLD") {
            self.metrics.reaction_threshold = value;
        }
        if let Some(value) = parsed("EVIMPACT_FLAT_DEAD_ZONE_PIPS") {
            self.metrics.flat_dead_zone_pips = value;
        }
        if let Some(value) = parsed("EVIMPACT_RETRACEMENT_FRACTION") {
            self.patterns.retracement_fraction = value;
        }
        if let Some(seconds) = parse_var::<i64, _>(&lookup, "EVIMPACT_FALSE_BREAKOUT_SECS") {
            self.patterns.false_breakout_window = Duration::seconds(seconds);
        }
        if let Some(value) = parse_var(&lookup, "EVIMPACT_MAX_CONCURRENT_READS") {
            self.max_concurrent_reads = value;
        }
        if let Some(seconds) = parse_var::<i64, _>(&lookup, "EVIMPACT_EXTRACTION_TIMEOUT_SECS") {
            self.extraction_timeout = Duration::seconds(seconds);
        }
        if let Some(value) = parse_var(&lookup, "EVIMPACT_MAX_WINDOW_BARS") {
            self.max_window_bars = value;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.surprise.validate()?;
        self.metrics.validate()?;
        self.patterns.validate()?;
        self.pip_scales.validate()?;

        if self.max_concurrent_reads == 0 {
            return Err(ValidationError::NonPositiveValue {
                field: "max_concurrent_reads",
            });
        }
        if !self.extraction_timeout.is_positive() {
            return Err(ValidationError::NonPositiveValue {
                field: "extraction_timeout",
            });
        }
        if self.max_window_bars == 0 {
            return Err(ValidationError::NonPositiveValue {
                field: "max_window_bars",
            });
        }
        Ok(())
    }

    /// Read timeout as a std duration for `tokio::time::timeout`.
    pub fn extraction_timeout_std(&self) -> std::time::Duration {
        self.extraction_timeout.unsigned_abs()
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|raw| raw.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn pair(raw: &str) -> Instrument {
        Instrument::parse(raw).expect("pair")
    }

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_reads, 8);
        assert_eq!(config.extraction_timeout_std(), std::time::Duration::from_secs(30));
        assert!(config.pip_scales.is_empty());
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EVIMPACT_SURPRISE_TOLERANCE", "0.05"),
            ("EVIMPACT_MAX_CONCURRENT_READS", " 2 "),
            ("EVIMPACT_EXTRACTION_TIMEOUT_SECS", "5"),
            ("EVIMPACT_REACTION_THRESHOLD", "not-a-number"),
        ]);
        let config = AnalysisConfig::default()
            .with_overrides(|name| vars.get(name).map(|value| (*value).to_owned()));

        assert_eq!(config.surprise.relative_tolerance, 0.05);
        assert_eq!(config.max_concurrent_reads, 2);
        assert_eq!(config.extraction_timeout, Duration::seconds(5));
        assert_eq!(config.metrics.reaction_threshold, 0.001);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = AnalysisConfig {
            max_concurrent_reads: 0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::NonPositiveValue {
                field: "max_concurrent_reads"
            })
        ));
    }

    #[test]
    fn forex_defaults_use_jpy_convention() {
        let scales = PipScales::forex_defaults(&[pair("EUR/USD"), pair("USD/JPY")]);
        assert_eq!(scales.get(&pair("EUR/USD")), Some(0.0001));
        assert_eq!(scales.get(&pair("USD/JPY")), Some(0.01));
        assert!(scales.get(&pair("GBP/USD")).is_none());
    }

    #[test]
    fn missing_pip_scale_is_a_validation_error() {
        let scales = PipScales::new()
            .with(pair("EUR/USD"), 0.0001)
            .expect("valid pip");
        assert!(matches!(
            scales.require(&pair("GBP/USD")),
            Err(ValidationError::UnknownPipScale { .. })
        ));
        assert!(PipScales::new().with(pair("EUR/USD"), 0.0).is_err());
    }

    #[test]
    fn deserializes_partial_json_over_defaults() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"metrics":{"reaction_threshold":0.002},"pip_scales":{"eurusd":0.0001},"extraction_timeout":10}"#,
        )
        .expect("config");

        assert_eq!(config.metrics.reaction_threshold, 0.002);
        assert_eq!(config.metrics.flat_dead_zone_pips, 0.5);
        assert_eq!(config.pip_scales.get(&pair("EUR/USD")), Some(0.0001));
        assert_eq!(config.extraction_timeout, Duration::seconds(10));
        assert_eq!(config.max_window_bars, 10_000);
    }
}
