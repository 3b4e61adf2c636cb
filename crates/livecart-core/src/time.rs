//! Wire timestamps: ISO-8601 UTC, millisecond precision, `Z` suffix.

use chrono::{DateTime, DurationRound, SecondsFormat, TimeDelta, Utc};

use crate::error::{LivecartError, Result};

/// Current UTC time truncated to whole milliseconds.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

pub fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(ts)
}

/// `2024-09-15T18:03:22.412Z`
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LivecartError::Timestamp(format!("{s}: {e}")))
}

/// Serde adapter for `DateTime<Utc>` fields that travel on the wire.
pub mod serde_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_ts(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_ts(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_millis_and_z() {
        let ts = Utc.with_ymd_and_hms(2024, 9, 15, 18, 3, 22).unwrap()
            + TimeDelta::milliseconds(412);
        assert_eq!(format_ts(&ts), "2024-09-15T18:03:22.412Z");
    }

    #[test]
    fn truncation_drops_sub_millisecond_digits() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + TimeDelta::microseconds(1_999);
        assert_eq!(format_ts(&truncate_millis(ts)), "2024-01-01T00:00:00.001Z");
    }

    #[test]
    fn parse_accepts_offsets() {
        let ts = parse_ts("2024-09-15T20:03:22.412+02:00").unwrap();
        assert_eq!(format_ts(&ts), "2024-09-15T18:03:22.412Z");
        assert!(parse_ts("15.09.2024 18:03:22").is_err());
    }
}
