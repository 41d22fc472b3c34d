//! Timestamp and delay parsing.
//!
//! Every timestamp that crosses a carecall boundary is RFC 3339 with an
//! explicit offset. Strings without an offset are rejected rather than
//! guessed at, so a reminder can never silently fire hours early or late.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::{Error, Result};

/// Parse an RFC 3339 timestamp with an explicit offset into UTC.
///
/// ```
/// use carecall_core::temporal::parse_timestamp;
///
/// let ts = parse_timestamp("2025-01-01T09:00:00+01:00").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2025-01-01T08:00:00+00:00");
/// assert!(parse_timestamp("2025-01-01T09:00:00").is_err());
/// ```
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let trimmed = raw.trim();
    DateTime::parse_from_rfc3339(trimmed)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            Error::InvalidInput(format!(
                "timestamp must be RFC 3339 with an offset, got {:?}: {}",
                trimmed, e
            ))
        })
}

/// Canonical wire form: RFC 3339, UTC, second precision, `Z` suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a delay like `"30m"`, `"2h"`, `"1h30m"` or `"1d"`.
///
/// A bare number is read as minutes. Zero and negative delays are rejected.
pub fn parse_delay(raw: &str) -> Result<Duration> {
    let text = raw.trim().to_lowercase();
    let invalid = || Error::InvalidInput(format!("Invalid delay: {:?}", raw));

    if text.is_empty() {
        return Err(invalid());
    }

    if let Ok(minutes) = text.parse::<i64>() {
        return positive_minutes(minutes).ok_or_else(invalid);
    }

    let mut total_seconds: i64 = 0;
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if c.is_whitespace() {
            continue;
        } else {
            if current.is_empty() {
                return Err(invalid());
            }
            let value: i64 = current.parse().map_err(|_| invalid())?;
            current.clear();

            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 60 * 60,
                'd' => 60 * 60 * 24,
                'w' => 60 * 60 * 24 * 7,
                _ => return Err(invalid()),
            };
            total_seconds = value
                .checked_mul(unit)
                .and_then(|s| total_seconds.checked_add(s))
                .ok_or_else(invalid)?;
        }
    }

    // Trailing digits without a unit, e.g. "1h30".
    if !current.is_empty() {
        return Err(invalid());
    }

    if total_seconds > 0 {
        Duration::try_seconds(total_seconds).ok_or_else(invalid)
    } else {
        Err(invalid())
    }
}

/// Minutes as a delay, rejecting non-positive values and anything past
/// the range a `Duration` can hold.
pub fn positive_minutes(minutes: i64) -> Option<Duration> {
    if minutes > 0 {
        Duration::try_minutes(minutes)
    } else {
        None
    }
}

/// Human-readable rendering of a delay, used in tool-call messages.
pub fn format_delay(delay: Duration) -> String {
    let seconds = delay.num_seconds();
    let plural = |n: i64| if n == 1 { "" } else { "s" };

    if seconds < 60 {
        format!("{} second{}", seconds, plural(seconds))
    } else if seconds < 3600 {
        let mins = seconds / 60;
        format!("{} minute{}", mins, plural(mins))
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!(
                "{} hour{} {} minute{}",
                hours,
                plural(hours),
                mins,
                plural(mins)
            )
        } else {
            format!("{} hour{}", hours, plural(hours))
        }
    } else {
        let days = seconds / 86400;
        format!("{} day{}", days, plural(days))
    }
}
