//! Display shaping: recent-window filtering and human-readable formatting.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::BreachRecord;

/// Default look-back window, in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 14;

/// Column labels in display order.
pub const COLUMN_LABELS: [&str; 6] = [
    "Entity Name",
    "Date Reported",
    "Total Affected",
    "State Residents Affected",
    "Reporting State/Agency",
    "Source Link",
];

/// First date inside a window of `days` ending at `today`.
pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Records reported on or after `since`, in feed order. Undated records are
/// never recent.
pub fn recent(records: &[BreachRecord], since: NaiveDate) -> Vec<&BreachRecord> {
    records
        .iter()
        .filter(|r| r.date_reported.is_some_and(|d| d >= since))
        .collect()
}

/// Count with thousands separators, or `N/A`.
pub fn format_count(count: Option<u64>) -> String {
    let Some(count) = count else {
        return "N/A".to_string();
    };
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// ISO calendar date, or `N/A`.
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// One table row, formatted for people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub entity_name: String,
    pub date_reported: String,
    pub total_affected: String,
    pub state_residents_affected: String,
    pub reporting_agency: String,
    pub source_link: Option<String>,
}

impl From<&BreachRecord> for DisplayRow {
    fn from(record: &BreachRecord) -> Self {
        Self {
            entity_name: record.entity_name.clone().unwrap_or_default(),
            date_reported: format_date(record.date_reported),
            total_affected: format_count(record.total_affected),
            state_residents_affected: format_count(record.state_residents_affected),
            reporting_agency: record.reporting_state_agency.code().to_string(),
            source_link: record.source_link.clone(),
        }
    }
}

impl DisplayRow {
    /// Cells in [`COLUMN_LABELS`] order.
    pub fn cells(&self) -> [&str; 6] {
        [
            self.entity_name.as_str(),
            self.date_reported.as_str(),
            self.total_affected.as_str(),
            self.state_residents_affected.as_str(),
            self.reporting_agency.as_str(),
            self.source_link.as_deref().unwrap_or(""),
        ]
    }
}

/// Formatted rows for the recent window.
pub fn display_rows(records: &[BreachRecord], since: NaiveDate) -> Vec<DisplayRow> {
    recent(records, since).into_iter().map(DisplayRow::from).collect()
}
