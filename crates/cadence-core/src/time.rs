// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timestamp helpers.
//!
//! Every timestamp persisted by Cadence uses the same fixed-width UTC format
//! so that string comparison in SQL equals chronological comparison.

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::error::CadenceError;

/// Storage format for all timestamps (`2026-03-01T09:30:00.000Z`).
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format an instant for storage.
pub fn format_ts(instant: DateTime<Utc>) -> String {
    instant.format(TS_FORMAT).to_string()
}

/// Parse a stored timestamp (also accepts any RFC 3339 string).
pub fn parse_ts(value: &str) -> Result<DateTime<Utc>, CadenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CadenceError::Internal(format!("bad timestamp `{value}`: {e}")))
}

/// Start of the UTC day containing `now`.
pub fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// The next UTC midnight strictly after `now`.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    utc_day_start(now) + Duration::days(1)
}

/// `[start, end)` of the UTC day containing `now`, formatted for storage.
pub fn utc_day_bounds(now: DateTime<Utc>) -> (String, String) {
    let start = utc_day_start(now);
    (format_ts(start), format_ts(start + Duration::days(1)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn format_round_trips_and_sorts() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(format_ts(a), "2026-03-01T09:05:00.000Z");
        assert_eq!(parse_ts(&format_ts(a)).unwrap(), a);
        assert!(format_ts(a) < format_ts(b));
    }

    #[test]
    fn day_bounds_cover_the_utc_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap();
        let (start, end) = utc_day_bounds(now);
        assert_eq!(start, "2026-03-01T00:00:00.000Z");
        assert_eq!(end, "2026-03-02T00:00:00.000Z");
        assert_eq!(format_ts(next_utc_midnight(now)), end);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_ts("yesterday").is_err());
    }

    proptest::proptest! {
        #[test]
        fn next_midnight_is_within_a_day(secs in 0i64..4_102_444_800) {
            let now = Utc.timestamp_opt(secs, 0).unwrap();
            let next = next_utc_midnight(now);
            proptest::prop_assert!(next > now);
            proptest::prop_assert!(next - now <= Duration::days(1));
            proptest::prop_assert_eq!(next.time(), NaiveTime::MIN);
        }
    }
}
