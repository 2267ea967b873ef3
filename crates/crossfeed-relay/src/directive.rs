//! Caption schedule directives — `#at` and `#in` parsing and stripping.
//!
//! Grammar (case-insensitive suffixes and `T` separator):
//!   `#at YYYY-MM-DD HH:MM`  or  `#at YYYY-MM-DDTHH:MM`  (UTC)
//!   `#in <N>m` / `#in <N>min` / `#in <N>h` / `#in <N>hour`
//!
//! `#at` is scanned before `#in`; the first recognized directive wins.
//! An unparseable `#at` date is treated as absent, not an error.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

fn at_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)#at\s+(\d{4}-\d{2}-\d{2})[ t](\d{2}:\d{2})").expect("valid regex")
    })
}

fn in_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)#in\s+(\d+)\s*(min|m|hour|h)\b").expect("valid regex"))
}

/// Resolve the scheduled time for a caption. No directive (or an
/// unparseable one) means immediate dispatch on the next tick.
pub fn parse_schedule(caption: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    if let Some(c) = at_re().captures(caption)
        && let Ok(naive) =
            NaiveDateTime::parse_from_str(&format!("{} {}", &c[1], &c[2]), "%Y-%m-%d %H:%M")
    {
        return Utc.from_utc_datetime(&naive);
    }
    if let Some(c) = in_re().captures(caption)
        && let Ok(n) = c[1].parse::<u32>()
    {
        let offset = if c[2].to_ascii_lowercase().starts_with('h') {
            Duration::hours(i64::from(n))
        } else {
            Duration::minutes(i64::from(n))
        };
        return now + offset;
    }
    now
}

/// Remove every recognized directive substring and collapse whitespace.
/// Idempotent: stripping a stripped caption changes nothing.
pub fn strip_schedule(caption: &str) -> String {
    let without_at = at_re().replace_all(caption, " ");
    let without_in = in_re().replace_all(&without_at, " ");
    without_in.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_in_minutes() {
        let now = at(2026, 8, 7, 12, 0);
        assert_eq!(parse_schedule("lunch pic #in 30m", now), now + Duration::seconds(1800));
        assert_eq!(parse_schedule("#in 30min", now), now + Duration::seconds(1800));
        assert_eq!(parse_schedule("#IN 30M", now), now + Duration::seconds(1800));
    }

    #[test]
    fn test_in_hours() {
        let now = at(2026, 8, 7, 12, 0);
        assert_eq!(parse_schedule("#in 2h", now), now + Duration::hours(2));
        assert_eq!(parse_schedule("#in 2 hour", now), now + Duration::hours(2));
    }

    #[test]
    fn test_at_absolute() {
        let now = at(2026, 8, 7, 12, 0);
        let expect = at(2026, 12, 24, 18, 30);
        assert_eq!(parse_schedule("#at 2026-12-24 18:30 teaser", now), expect);
        assert_eq!(parse_schedule("#at 2026-12-24T18:30", now), expect);
        assert_eq!(parse_schedule("#at 2026-12-24t18:30", now), expect);
    }

    #[test]
    fn test_at_wins_over_in() {
        let now = at(2026, 8, 7, 12, 0);
        let got = parse_schedule("#at 2026-12-24 18:30 #in 5m", now);
        assert_eq!(got, at(2026, 12, 24, 18, 30));
    }

    #[test]
    fn test_bad_at_falls_through_to_in() {
        let now = at(2026, 8, 7, 12, 0);
        // month 13 matches the grammar but not the calendar
        let got = parse_schedule("#at 2026-13-01 10:00 #in 5m", now);
        assert_eq!(got, now + Duration::minutes(5));
    }

    #[test]
    fn test_no_directive_means_now() {
        let now = at(2026, 8, 7, 12, 0);
        assert_eq!(parse_schedule("just a caption", now), now);
        assert_eq!(parse_schedule("", now), now);
    }

    #[test]
    fn test_strip_removes_both_grammars() {
        assert_eq!(strip_schedule("hello #in 30m world"), "hello world");
        assert_eq!(strip_schedule("#at 2026-12-24 18:30 teaser"), "teaser");
        assert_eq!(strip_schedule("a  #AT 2026-01-01T00:00  b #In 5min c"), "a b c");
    }

    #[test]
    fn test_strip_is_idempotent() {
        for caption in [
            "hello #in 30m world",
            "#at 2026-12-24 18:30 teaser",
            "plain text   with   spaces",
            "",
        ] {
            let once = strip_schedule(caption);
            assert_eq!(strip_schedule(&once), once, "not idempotent for {caption:?}");
        }
    }

    #[test]
    fn test_strip_keeps_unrecognized_tags() {
        assert_eq!(strip_schedule("#instant classic"), "#instant classic");
        assert_eq!(strip_schedule("#at noonish"), "#at noonish");
    }
}
