//! Submission timestamps in a fixed named timezone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Timezone used when none is configured.
pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";

/// Layout written to the timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Parse an IANA timezone name such as `America/Los_Angeles`.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Render `now` in `tz` as `YYYY/MM/DD HH:MM:SS`.
pub fn format_timestamp(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format(TIMESTAMP_FORMAT).to_string()
}

/// Current wall-clock time in `tz`. Computed fresh on every submission.
pub fn submission_timestamp(tz: Tz) -> String {
    format_timestamp(Utc::now(), tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_in_pacific_daylight_time() {
        let now = Utc.with_ymd_and_hms(2024, 9, 30, 19, 5, 9).unwrap();
        let tz = parse_timezone(DEFAULT_TIMEZONE).unwrap();
        assert_eq!(format_timestamp(now, tz), "2024/09/30 12:05:09");
    }

    #[test]
    fn test_format_in_pacific_standard_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let tz = parse_timezone(DEFAULT_TIMEZONE).unwrap();
        assert_eq!(format_timestamp(now, tz), "2024/01/15 00:00:00");
    }

    #[test]
    fn test_date_rolls_back_across_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 30, 0).unwrap();
        let tz = parse_timezone(DEFAULT_TIMEZONE).unwrap();
        assert_eq!(format_timestamp(now, tz), "2024/02/29 18:30:00");
    }

    #[test]
    fn test_parse_timezone_rejects_unknown() {
        assert!(parse_timezone("Mars/Olympus_Mons").is_none());
        assert!(parse_timezone(" UTC ").is_some());
    }

    #[test]
    fn test_submission_timestamp_shape() {
        let ts = submission_timestamp(chrono_tz::UTC);
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "/");
        assert_eq!(&ts[13..14], ":");
    }
}
