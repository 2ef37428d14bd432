use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::ValidationError;

/// Naive layouts accepted by [`UtcDateTime::parse_local`].
const LOCAL_FORMATS: [&[FormatItem<'static>]; 3] = [
    format_description!("[year]-[month]-[day] [hour repr:12]:[minute] [period case_sensitive:false]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour repr:12]:[minute][period case_sensitive:false]"),
];

/// Instant normalized to UTC.
///
/// Every constructor converts its input to UTC, so two values coming from
/// differently-zoned sources always compare in the same reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parse an RFC3339 timestamp with any offset and normalize it to UTC.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input.trim(), &Rfc3339).map_err(|_| {
            ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            }
        })?;

        Ok(Self::from_offset_datetime(parsed))
    }

    /// Parse a naive calendar datetime authored in a known UTC offset.
    ///
    /// Accepts `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM AM` and
    /// `YYYY-MM-DD HH:MMAM`.
    pub fn parse_local(input: &str, source_offset: UtcOffset) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        LOCAL_FORMATS
            .iter()
            .find_map(|format| PrimitiveDateTime::parse(trimmed, format).ok())
            .map(|naive| Self::from_offset_datetime(naive.assume_offset(source_offset)))
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    pub fn unix_timestamp(self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Shift by a signed duration, saturating at the representable range.
    pub fn shift(self, by: Duration) -> Self {
        self.0
            .checked_add(by)
            .map(Self)
            .unwrap_or(if by.is_negative() { Self::MIN } else { Self::MAX })
    }

    /// Signed elapsed time from `earlier` to `self`.
    pub fn since(self, earlier: Self) -> Duration {
        self.0 - earlier.0
    }

    pub const MIN: Self = Self(time::PrimitiveDateTime::MIN.assume_utc());
    pub const MAX: Self = Self(time::PrimitiveDateTime::MAX.assume_utc());

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Serde helpers encoding `time::Duration` as whole seconds.
pub mod serde_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.whole_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Duration::seconds)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Duration;

        pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(duration) => serializer.serialize_some(&duration.whole_seconds()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<i64>::deserialize(deserializer).map(|value| value.map(Duration::seconds))
        }
    }
}
