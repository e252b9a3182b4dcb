//! Human-readable date parsing.
//!
//! Parses strings like "2 days ago", "yesterday", "in 1 week" into the
//! `YYYY-MM-DD HH:MM:SS` local-time strings stored in the note index.

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};

use crate::Error;

/// Format of every date stored in the index.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a human-readable date string into an index date string.
///
/// Supports:
/// - Index format: "2026-01-28 12:00:00" (passed through)
/// - Date only: "2026-01-28" (midnight)
/// - Relative past: "2 days ago", "1 week ago", "3 hours ago"
/// - Relative future: "in 2 days", "in 1 week"
/// - Named: "today", "yesterday", "tomorrow", "now"
pub fn parse_human_date(input: &str) -> Result<String, Error> {
    parse_relative_to(input, Local::now().naive_local())
        .map(format_datetime)
        .ok_or_else(|| Error::Validation(format!("unrecognized date: {}", input.trim())))
}

/// Parse a human-readable date string into a calendar day.
pub fn parse_day(input: &str) -> Result<NaiveDate, Error> {
    parse_relative_to(input, Local::now().naive_local())
        .map(|dt| dt.date())
        .ok_or_else(|| Error::Validation(format!("unrecognized date: {}", input.trim())))
}

/// Like [`parse_human_date`], but a whole-day input ("2024-07-20",
/// "today", "yesterday", "tomorrow") resolves to the last second of that
/// day. Used for inclusive upper bounds.
pub fn parse_end_date(input: &str) -> Result<String, Error> {
    end_relative_to(input, Local::now().naive_local())
        .map(format_datetime)
        .ok_or_else(|| Error::Validation(format!("unrecognized date: {}", input.trim())))
}

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

fn parse_relative_to(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let input = input.trim().to_lowercase();

    if let Ok(dt) = NaiveDateTime::parse_from_str(&input, DATE_FORMAT) {
        return Some(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(&input, "%Y-%m-%d") {
        return Some(date.and_time(chrono::NaiveTime::MIN));
    }

    match input.as_str() {
        "now" => return Some(now),
        "today" => return Some(start_of_day(now)),
        "yesterday" => return start_of_day(now).checked_sub_signed(TimeDelta::days(1)),
        "tomorrow" => return start_of_day(now).checked_add_signed(TimeDelta::days(1)),
        _ => {}
    }

    // Out-of-range offsets are rejected rather than wrapped.
    if let Some(duration) = input.strip_suffix(" ago").and_then(parse_duration) {
        return now.checked_sub_signed(duration);
    }

    if let Some(duration) = input.strip_prefix("in ").and_then(parse_duration) {
        return now.checked_add_signed(duration);
    }

    None
}

fn end_relative_to(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let dt = parse_relative_to(input, now)?;
    if names_whole_day(input) {
        dt.date().and_hms_opt(23, 59, 59)
    } else {
        Some(dt)
    }
}

fn names_whole_day(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    matches!(input.as_str(), "today" | "yesterday" | "tomorrow")
        || NaiveDate::parse_from_str(&input, "%Y-%m-%d").is_ok()
}

fn start_of_day(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(chrono::NaiveTime::MIN)
}

/// Parse a duration like "2 days", "1 week", "3h"
fn parse_duration(input: &str) -> Option<TimeDelta> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    match parts.as_slice() {
        [num, unit] => unit_to_duration(unit, num.parse().ok()?),
        [word] => {
            let num_end = word.chars().take_while(|c| c.is_ascii_digit()).count();
            if num_end == 0 || num_end == word.len() {
                return None;
            }
            unit_to_duration(&word[num_end..], word[..num_end].parse().ok()?)
        }
        _ => None,
    }
}

fn unit_to_duration(unit: &str, num: i64) -> Option<TimeDelta> {
    let unit = unit.trim_end_matches('s');
    match unit {
        "second" | "sec" => TimeDelta::try_seconds(num),
        "minute" | "min" => TimeDelta::try_minutes(num),
        "hour" | "hr" | "h" => TimeDelta::try_hours(num),
        "day" | "d" => TimeDelta::try_days(num),
        "week" | "wk" | "w" => TimeDelta::try_weeks(num),
        "month" | "mon" => TimeDelta::try_days(num.checked_mul(30)?), // Approximate
        "year" | "yr" | "y" => TimeDelta::try_days(num.checked_mul(365)?), // Approximate
        _ => None,
    }
}
