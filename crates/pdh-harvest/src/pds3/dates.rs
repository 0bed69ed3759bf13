//! Date/datetime sub-grammar shared by all catalog grammars
//!
//! Catalog files mix calendar dates, day-of-year dates, full timestamps
//! and ISO week dates, all written by hand over three decades. Anything a
//! listed layout accepts parses; `UNK`-like tokens are handled one level
//! up, in the value grammar.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed PDS date, preserving whether a time component was present
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PdsDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl PdsDate {
    pub fn from_date(date: NaiveDate) -> Self {
        Self { date, time: None }
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self {
            date: dt.date(),
            time: Some(dt.time()),
        }
    }

    /// Timestamp with midnight filled in for date-only values
    pub fn datetime(&self) -> NaiveDateTime {
        self.date
            .and_time(self.time.unwrap_or_else(|| NaiveTime::MIN))
    }
}

impl fmt::Display for PdsDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(time) => write!(f, "{}T{}", self.date.format("%Y-%m-%d"), time.format("%H:%M:%S%.3f")),
            None => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

impl From<PdsDate> for String {
    fn from(value: PdsDate) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PdsDate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_date(&value).ok_or_else(|| format!("not a PDS date: {}", value))
    }
}

const DATETIME_FORMATS: &[&str] = &[
    // Calendar timestamps
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M",
    // Day-of-year timestamps
    "%Y-%jT%H:%M:%S%.f",
    "%Y-%jT%H:%M:%S",
    "%Y-%jT%H:%M",
];

const DATE_FORMATS: &[&str] = &[
    // Calendar date
    "%Y-%m-%d",
    // Day-of-year date
    "%Y-%j",
];

/// Parse any accepted PDS date layout
pub fn parse_date(text: &str) -> Option<PdsDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(PdsDate::from_datetime(dt));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            // `%Y-%j` is greedy enough to also accept `%Y-%m`; require the
            // day-of-year form to carry three digits
            if format == &"%Y-%j" {
                let day_part = trimmed.rsplit('-').next()?;
                if day_part.len() != 3 {
                    continue;
                }
            }
            return Some(PdsDate::from_date(date));
        }
    }
    // ISO week date: 1994-W41 or 1994-W41-2
    if let Some(date) = parse_iso_week(trimmed) {
        return Some(PdsDate::from_date(date));
    }
    None
}

/// `YYYY-Www[-D]` ISO 8601 week dates
fn parse_iso_week(text: &str) -> Option<NaiveDate> {
    use chrono::Weekday;

    let mut parts = text.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let week_part = parts.next()?;
    let week: u32 = week_part.strip_prefix('W')?.parse().ok()?;
    let weekday = match parts.next() {
        Some(day) => day.parse::<u32>().ok()?,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }
    let weekday = match weekday {
        1 => Weekday::Mon,
        2 => Weekday::Tue,
        3 => Weekday::Wed,
        4 => Weekday::Thu,
        5 => Weekday::Fri,
        6 => Weekday::Sat,
        7 => Weekday::Sun,
        _ => return None,
    };
    NaiveDate::from_isoywd_opt(year, week, weekday)
}

/// True when the token can only be a date (used by value classification)
pub fn looks_like_date(text: &str) -> bool {
    parse_date(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_date() {
        let parsed = parse_date("1994-10-12").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(1994, 10, 12).unwrap());
        assert!(parsed.time.is_none());
    }

    #[test]
    fn test_day_of_year_date() {
        let parsed = parse_date("1997-258").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(1997, 9, 15).unwrap());
    }

    #[test]
    fn test_full_timestamps() {
        let parsed = parse_date("1997-09-15T19:21:30.125").unwrap();
        assert_eq!(parsed.datetime().format("%H:%M:%S%.3f").to_string(), "19:21:30.125");

        let parsed = parse_date("1997-09-15T19:21:30Z").unwrap();
        assert_eq!(parsed.datetime().format("%H:%M:%S").to_string(), "19:21:30");

        let parsed = parse_date("1997-258T19:21:30").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(1997, 9, 15).unwrap());
    }

    #[test]
    fn test_iso_week_dates() {
        let parsed = parse_date("2004-W28").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_isoywd_opt(2004, 28, chrono::Weekday::Mon).unwrap());

        let parsed = parse_date("2004-W28-3").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_isoywd_opt(2004, 28, chrono::Weekday::Wed).unwrap());
    }

    #[test]
    fn test_rejects_non_dates() {
        assert!(parse_date("MGS-M-MOLA-3-PEDR-L1A-V1.0").is_none());
        assert!(parse_date("PDS3").is_none());
        assert!(parse_date("12.5").is_none());
        assert!(parse_date("1994-13-40").is_none());
        assert!(parse_date("").is_none());
        // Two-digit suffix is year-month, not day-of-year
        assert!(parse_date("1994-10").is_none());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["1994-10-12", "1997-09-15T19:21:30.125"] {
            let parsed = parse_date(text).unwrap();
            let reparsed = parse_date(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed);
        }
    }
}
