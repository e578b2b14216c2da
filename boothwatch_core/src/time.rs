use std::{fmt, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

#[derive(Debug, thiserror::Error)]
#[error("invalid RFC 3339 timestamp `{input}`")]
pub struct TimestampParseError {
    input: String,
    #[source]
    source: chrono::ParseError,
}

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_epoch_secs(epoch_secs: i64) -> Option<Self> {
        DateTime::from_timestamp(epoch_secs, 0).map(Self)
    }

    pub fn from_epoch_millis(epoch_millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(epoch_millis).map(Self)
    }

    pub fn parse_rfc3339(input: &str) -> Result<Self, TimestampParseError> {
        DateTime::parse_from_rfc3339(input)
            .map(|parsed| Self(parsed.with_timezone(&Utc)))
            .map_err(|source| TimestampParseError {
                input: input.to_owned(),
                source,
            })
    }

    pub fn as_epoch_secs(self) -> i64 {
        self.0.timestamp()
    }

    pub fn as_epoch_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let chrono_duration = chrono::Duration::from_std(duration).ok()?;
        self.0.checked_add_signed(chrono_duration).map(Self)
    }

    pub fn signed_duration_since(self, earlier: Self) -> chrono::Duration {
        self.0.signed_duration_since(earlier.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}
