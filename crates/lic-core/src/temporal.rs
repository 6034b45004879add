//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds precision.
//!
//! Timestamps end up inside signed payloads, so two encodings of the same
//! instant must never differ. `Timestamp` always renders as
//! `YYYY-MM-DDTHH:MM:SSZ`: no sub-seconds, no `+00:00`, always `Z`.
//!
//! Input is accepted in two modes. [`Timestamp::parse()`] accepts only the
//! `Z` form. [`Timestamp::parse_lenient()`] accepts any RFC 3339 offset (and
//! naive date-times, taken as UTC) and converts to UTC. Deserialization uses
//! the lenient mode since request bodies come from arbitrary clients.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`]: current UTC time, truncated.
/// - [`Timestamp::from_utc()`]: from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`]: from an ISO8601 string, rejecting non-UTC offsets.
/// - [`Timestamp::parse_lenient()`]: from any RFC 3339 string, converted to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp that carries the `Z` suffix.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimestamp` if the string is not valid
    /// RFC 3339 or uses any offset other than `Z` (including `+00:00`).
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::InvalidTimestamp(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            ValidationError::InvalidTimestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Parse a timestamp, accepting any timezone offset and converting to UTC.
    ///
    /// A string without an offset (`2025-01-01T00:00:00`) is taken as UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, ValidationError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self(truncate_to_seconds(naive.and_utc())))
            .map_err(|e| {
                ValidationError::InvalidTimestamp(format!("invalid RFC 3339 timestamp {s:?}: {e}"))
            })
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, ValidationError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp(format!("invalid Unix timestamp: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Add whole days, failing on overflow.
    pub fn checked_add_days(&self, days: u32) -> Result<Self, ValidationError> {
        self.0
            .checked_add_signed(Duration::days(i64::from(days)))
            .map(Self)
            .ok_or_else(|| {
                ValidationError::InvalidTimestamp(format!("{self} + {days} days is out of range"))
            })
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_lenient(&s).map_err(serde::de::Error::custom)
    }
}

/// Truncate a `DateTime<Utc>` to seconds precision (discard nanoseconds).
fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(123_456_789).unwrap());
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:30:45Z");
    }

    #[test]
    fn test_display_matches_iso8601() {
        let ts = Timestamp::from_utc(Utc.with_ymd_and_hms(2026, 6, 30, 23, 59, 59).unwrap());
        assert_eq!(format!("{ts}"), ts.to_iso8601());
    }

    // ---- parse() strict mode ----

    #[test]
    fn test_parse_z_suffix_accepted() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_offsets_rejected() {
        assert!(Timestamp::parse("2026-01-15T12:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-01-15T17:00:00+05:00").is_err());
    }

    #[test]
    fn test_parse_garbage_rejected() {
        assert!(matches!(
            Timestamp::parse("not-a-dateZ"),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }

    // ---- parse_lenient() ----

    #[test]
    fn test_parse_lenient_converts_offset() {
        let ts = Timestamp::parse_lenient("2026-01-15T17:00:00+05:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_parse_lenient_truncates_fraction() {
        let ts = Timestamp::parse_lenient("2025-01-01T00:00:00.999Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_parse_lenient_naive_is_utc() {
        let ts = Timestamp::parse_lenient("2025-03-04T05:06:07").unwrap();
        assert_eq!(ts.to_iso8601(), "2025-03-04T05:06:07Z");
    }

    #[test]
    fn test_parse_lenient_rejects_date_only() {
        assert!(Timestamp::parse_lenient("2025-01-01").is_err());
    }

    // ---- serde ----

    #[test]
    fn test_serialize_as_z_string() {
        let ts = Timestamp::parse("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(
            serde_json::to_string(&ts).unwrap(),
            "\"2025-01-01T00:00:00Z\""
        );
    }

    #[test]
    fn test_deserialize_normalizes() {
        let ts: Timestamp = serde_json::from_str("\"2024-12-31T19:00:00-05:00\"").unwrap();
        assert_eq!(ts.to_iso8601(), "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_deserialize_rejects_non_string() {
        assert!(serde_json::from_str::<Timestamp>("1735689600").is_err());
    }

    // ---- arithmetic / ordering ----

    #[test]
    fn test_checked_add_days() {
        let ts = Timestamp::parse("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(
            ts.checked_add_days(365).unwrap().to_iso8601(),
            "2026-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_ordering_after_truncation() {
        let a = Timestamp::parse_lenient("2025-01-01T00:00:00.100Z").unwrap();
        let b = Timestamp::parse_lenient("2025-01-01T00:00:00.900Z").unwrap();
        assert_eq!(a, b);
        assert!(a < Timestamp::parse("2025-01-01T00:00:01Z").unwrap());
    }

    #[test]
    fn test_epoch_roundtrip() {
        let ts = Timestamp::from_epoch_secs(1_735_689_600).unwrap();
        assert_eq!(ts.to_iso8601(), "2025-01-01T00:00:00Z");
        assert_eq!(ts.epoch_secs(), 1_735_689_600);
    }
}
