// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Send-window evaluation.
//!
//! `now` is converted into the lead's timezone when one is set, otherwise the
//! campaign's. Sending is allowed iff the local weekday is allowed and the
//! local minute of day lies in `[start, end]`. A timezone that cannot be
//! resolved fails open: the send is allowed and a warning is logged.

use cadence_core::ResolvedWindow;
use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Whether `now` falls inside the window.
pub fn is_within_window(
    window: &ResolvedWindow,
    timezone_override: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    let tz_name = timezone_override
        .map(str::trim)
        .filter(|tz| !tz.is_empty())
        .unwrap_or(&window.timezone);

    let tz: Tz = match tz_name.parse() {
        Ok(tz) => tz,
        Err(_) => {
            warn!(timezone = %tz_name, "unresolvable send-window timezone, allowing send");
            return true;
        }
    };

    let local = now.with_timezone(&tz);
    let minute = local.hour() * 60 + local.minute();
    window.weekdays.contains(&local.weekday())
        && minute >= window.start_minute
        && minute <= window.end_minute
}

#[cfg(test)]
mod tests {
    use cadence_core::SendWindow;
    use chrono::{TimeZone, Weekday};
    use proptest::prelude::*;

    use super::*;

    fn business_hours(tz: &str) -> ResolvedWindow {
        SendWindow {
            timezone: tz.to_string(),
            ..SendWindow::default()
        }
        .resolve()
    }

    #[test]
    fn boundaries_are_inclusive() {
        let window = business_hours("UTC");
        // 2026-03-02 is a Monday.
        let at = |h, m| Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap();
        assert!(!is_within_window(&window, None, at(8, 59)));
        assert!(is_within_window(&window, None, at(9, 0)));
        assert!(is_within_window(&window, None, at(17, 0)));
        assert!(!is_within_window(&window, None, at(17, 1)));
    }

    #[test]
    fn weekend_is_closed_by_default() {
        let window = business_hours("UTC");
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(saturday.weekday(), Weekday::Sat);
        assert!(!is_within_window(&window, None, saturday));
    }

    #[test]
    fn lead_timezone_overrides_campaign_timezone() {
        let window = business_hours("UTC");
        // 14:00 UTC Monday is 06:00 in Los Angeles (PST, UTC-8).
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        assert!(is_within_window(&window, None, now));
        assert!(!is_within_window(&window, Some("America/Los_Angeles"), now));
    }

    #[test]
    fn local_weekday_is_used() {
        let window = business_hours("Asia/Tokyo");
        // Friday 23:30 UTC is Saturday 08:30 in Tokyo.
        let now = Utc.with_ymd_and_hms(2026, 3, 6, 23, 30, 0).unwrap();
        assert!(!is_within_window(&window, None, now));
    }

    #[test]
    fn malformed_timezone_fails_open() {
        let window = business_hours("Not/AZone");
        let sunday_night = Utc.with_ymd_and_hms(2026, 3, 8, 23, 0, 0).unwrap();
        assert!(is_within_window(&window, None, sunday_night));
        let utc = business_hours("UTC");
        assert!(is_within_window(&utc, Some("garbage"), sunday_night));
    }

    #[test]
    fn blank_override_uses_campaign_timezone() {
        let window = business_hours("UTC");
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        assert!(!is_within_window(&window, Some("  "), saturday));
    }

    proptest! {
        #[test]
        fn utc_window_matches_minute_arithmetic(
            start in 0u32..1440,
            len in 0u32..1440,
            minute in 0u32..1440,
        ) {
            let end = (start + len).min(1439);
            let window = ResolvedWindow {
                start_minute: start,
                end_minute: end,
                timezone: "UTC".into(),
                weekdays: vec![Weekday::Mon],
            };
            let now = Utc.with_ymd_and_hms(2026, 3, 2, minute / 60, minute % 60, 0).unwrap();
            prop_assert_eq!(is_within_window(&window, None, now), minute >= start && minute <= end);
        }

        #[test]
        fn unknown_timezone_always_allows(name in "[a-z]{3,12}/[a-z]{3,12}", minute in 0u32..1440) {
            let window = ResolvedWindow {
                start_minute: 0,
                end_minute: 0,
                timezone: name,
                weekdays: vec![],
            };
            let now = Utc.with_ymd_and_hms(2026, 3, 2, minute / 60, minute % 60, 0).unwrap();
            prop_assert!(is_within_window(&window, None, now));
        }
    }
}
