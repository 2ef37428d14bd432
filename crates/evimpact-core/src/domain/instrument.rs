use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::domain::models::validate_currency_code;
use crate::ValidationError;

/// Normalized currency pair in `BASE/QUOTE` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instrument(String);

impl Instrument {
    /// Parse `EUR/USD`, `eur/usd` or the compact `EURUSD` form.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInstrument);
        }

        let invalid = || ValidationError::InvalidInstrument {
            value: input.to_owned(),
        };

        let (base, quote) = match trimmed.split_once('/') {
            Some((base, quote)) if !quote.contains('/') => (base.trim(), quote.trim()),
            Some(_) => return Err(invalid()),
            None if trimmed.len() == 6 && trimmed.is_ascii() => trimmed.split_at(3),
            None => return Err(invalid()),
        };

        let base = validate_currency_code(base).map_err(|_| invalid())?;
        let quote = validate_currency_code(quote).map_err(|_| invalid())?;
        if base == quote {
            return Err(invalid());
        }

        Ok(Self(format!("{base}/{quote}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        &self.0[..3]
    }

    pub fn quote(&self) -> &str {
        &self.0[4..]
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Instrument {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Instrument {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Instrument> for String {
    fn from(value: Instrument) -> Self {
        value.0
    }
}
