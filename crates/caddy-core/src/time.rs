//! Countdown arithmetic and display formats.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Format used for the menu-bar title, e.g. `Fri 09:30`.
pub const TITLE_TIME_FORMAT: &str = "%a %H:%M";

/// Format used for entries in the upcoming list, e.g. `03-14 09:30`.
pub const ENTRY_TIME_FORMAT: &str = "%m-%d %H:%M";

/// Signed duration from `now` until `start`.
///
/// Negative when `start` is already in the past.
pub fn time_until(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    start - now
}

/// How long to wait before alerting `lead` ahead of `start`.
///
/// Clamps to zero: a meeting already inside the lead window (or already
/// running) alerts right away instead of being skipped.
pub fn countdown(start: DateTime<Utc>, now: DateTime<Utc>, lead: Duration) -> std::time::Duration {
    (time_until(start, now) - lead)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Formats `at` in the given timezone with a strftime pattern.
pub fn format_in<Tz>(at: DateTime<Utc>, tz: &Tz, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    at.with_timezone(tz).format(pattern).to_string()
}
