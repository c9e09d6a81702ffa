//! Canonical session date/time handling. Dates and times are kept as
//! `NaiveDate`/`NaiveTime` and only rendered as display strings at the edge.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime};

const TIME_FORMATS: &[&str] = &["%I:%M %p", "%I:%M%p", "%H:%M:%S", "%H:%M"];

/// Parses a session date relative to `today`.
///
/// Accepts `2025-06-27`, RFC 3339 timestamps and the legacy display forms
/// `Fri, Jun 27` / `Jun 27`, which resolve to their next occurrence on or after `today`.
pub fn parse_session_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.date_naive());
    }

    for year in [today.year(), today.year() + 1] {
        for format in ["%a, %b %d %Y", "%b %d %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(&format!("{} {}", raw, year), format) {
                if date >= today {
                    return Ok(date);
                }
            }
        }
    }

    Err(format!("Unrecognised session date: {}", raw))
}

pub fn parse_session_time(raw: &str) -> Result<NaiveTime, String> {
    let mut normalized = raw.trim().to_ascii_uppercase();

    // chrono needs minutes, so "3 PM" becomes "3:00 PM".
    if let Some(meridiem) = ["AM", "PM"].iter().find(|m| normalized.ends_with(*m)) {
        let hour = normalized[..normalized.len() - 2].trim_end();
        if !hour.is_empty() && hour.chars().all(|c| c.is_ascii_digit()) {
            normalized = format!("{}:00 {}", hour, meridiem);
        }
    }

    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&normalized, format).ok())
        .ok_or_else(|| format!("Unrecognised session time: {}", raw.trim()))
}

/// `Fri, Jun 27`
pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%a, %b %-d").to_string()
}

/// `3:00 PM`
pub fn format_display_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Serde adapter storing times in their display form.
pub mod display_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_display_time(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_session_time(&raw).map_err(serde::de::Error::custom)
    }
}
