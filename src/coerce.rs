//! Lenient coercion of scraped text into counts and calendar dates.
//!
//! Every function here returns `None` for text it cannot interpret. A missing
//! value is never replaced with zero or a default date.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.]").expect("valid numeric filter"));

/// Date layouts seen across the breach listings, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    // two-digit years first; "%Y" would read "24" as year 24
    "%m/%d/%y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%B %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Parse a person count out of free text.
///
/// Everything except digits and `.` is stripped first, so `"1,234 people"`
/// and `"$ 1 234"` both yield `1234`. Text with no digits, more than one
/// decimal point, or a non-zero fractional part is rejected.
pub fn parse_count(text: &str) -> Option<u64> {
    let stripped = NON_NUMERIC.replace_all(text, "");
    if stripped.is_empty() {
        return None;
    }

    let (whole, fraction) = match stripped.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (stripped.as_ref(), ""),
    };
    if whole.is_empty() || fraction.contains('.') || fraction.bytes().any(|b| b != b'0') {
        return None;
    }

    whole.parse().ok()
}

/// Parse a calendar date in any of the common listing layouts.
///
/// Timestamps are truncated to their date. Unrecognized text yields `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
            return Some(datetime.date());
        }
    }

    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }

    None
}

/// Parse a `YYYY.MM.DD` date. Dots are normalized to slashes and the result
/// must match `YYYY/MM/DD` exactly.
pub fn parse_dotted_date(text: &str) -> Option<NaiveDate> {
    let normalized = text.trim().replace('.', "/");
    NaiveDate::parse_from_str(&normalized, "%Y/%m/%d").ok()
}

/// Remove a repeated column label from the front of a value.
///
/// `strip_label("Date Reported 03/15/2024", "Date Reported")` yields
/// `"03/15/2024"`. Values without the label are returned trimmed.
pub fn strip_label<'a>(value: &'a str, label: &str) -> &'a str {
    let value = value.trim();
    value.strip_prefix(label).map(str::trim_start).unwrap_or(value)
}

/// Treat whitespace-only text as missing.
pub fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
