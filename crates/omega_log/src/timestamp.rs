//! Event timestamps.
//!
//! The wire text is kept exactly as received and is what the event hash
//! covers. Re-rendering through chrono would change `.000Z` into `Z` and
//! break the seal of events written by other producers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated RFC 3339 timestamp that keeps its original text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    text: String,
    instant: DateTime<Utc>,
}

impl Timestamp {
    /// Parse RFC 3339 text, keeping it verbatim.
    ///
    /// # Errors
    ///
    /// Returns error if `text` is not RFC 3339
    pub fn parse(text: impl Into<String>) -> Result<Self, chrono::ParseError> {
        let text = text.into();
        let instant = DateTime::parse_from_rfc3339(&text)?.with_timezone(&Utc);
        Ok(Self { text, instant })
    }

    /// Wire text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Instant in UTC
    #[must_use]
    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// Renders as `YYYY-MM-DDTHH:MM:SS.mmmZ`
impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self {
            text: instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            instant,
        }
    }
}

impl TryFrom<String> for Timestamp {
    type Error = chrono::ParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.text
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_datetime_uses_millis() {
        let dt = Utc.with_ymd_and_hms(2026, 2, 4, 10, 30, 0).unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(ts.as_str(), "2026-02-04T10:30:00.000Z");
        assert_eq!(ts.to_datetime(), dt);
    }

    #[test]
    fn test_parse_keeps_text() {
        for text in [
            "2026-02-04T10:30:00Z",
            "2026-02-04T10:30:00.000Z",
            "2026-02-04T12:30:00+02:00",
        ] {
            let ts = Timestamp::parse(text).unwrap();
            assert_eq!(ts.as_str(), text);
            assert_eq!(
                ts.to_datetime(),
                Utc.with_ymd_and_hms(2026, 2, 4, 10, 30, 0).unwrap()
            );
        }
    }

    #[test]
    fn test_serde_is_verbatim() {
        let ts: Timestamp = serde_json::from_str("\"2026-02-04T10:30:00.000Z\"").unwrap();
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"2026-02-04T10:30:00.000Z\""
        );
        assert!(serde_json::from_str::<Timestamp>("\"yesterday\"").is_err());
    }
}
