//! Core data types: agencies, intermediate tables, unified records and the feed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Government body that published a breach notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Agency {
    #[serde(rename = "ME")]
    Maine,
    #[serde(rename = "HHS")]
    Hhs,
    #[serde(rename = "TX")]
    Texas,
    #[serde(rename = "WA")]
    Washington,
    #[serde(rename = "HI")]
    Hawaii,
    #[serde(rename = "CA")]
    California,
}

impl Agency {
    /// All agencies in pipeline order.
    pub const ALL: [Agency; 6] = [
        Agency::Maine,
        Agency::Hhs,
        Agency::Texas,
        Agency::Washington,
        Agency::Hawaii,
        Agency::California,
    ];

    /// Short jurisdiction code (state postal code or "HHS").
    pub fn code(&self) -> &'static str {
        match self {
            Agency::Maine => "ME",
            Agency::Hhs => "HHS",
            Agency::Texas => "TX",
            Agency::Washington => "WA",
            Agency::Hawaii => "HI",
            Agency::California => "CA",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Agency::Maine => "Maine Attorney General",
            Agency::Hhs => "HHS Office for Civil Rights",
            Agency::Texas => "Texas Attorney General",
            Agency::Washington => "Washington Attorney General",
            Agency::Hawaii => "Hawaii Office of Consumer Protection",
            Agency::California => "California Attorney General",
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Agency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Agency::ALL
            .into_iter()
            .find(|a| a.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown agency code: {}", s))
    }
}

/// Intermediate per-source table in the source's native column vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Create an empty table with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from key/value records. Columns are the union of keys in
    /// first-seen order; keys a record lacks become empty cells.
    pub fn from_records(records: Vec<Vec<(String, String)>>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for (key, _) in record {
                if !index.contains_key(key) {
                    index.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|record| {
                let mut row = vec![None; columns.len()];
                for (key, value) in record {
                    row[index[&key]] = Some(value);
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    /// Append a row. Short rows are padded, long rows truncated to the column count.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a native column, if the source produced it.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell text at `row` for the named column.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Replace column names by position. Returns false when the counts differ,
    /// in which case only the overlapping prefix is renamed.
    pub fn rename_positional(&mut self, names: &[&str]) -> bool {
        for (column, name) in self.columns.iter_mut().zip(names) {
            *column = (*name).to_string();
        }
        self.columns.len() == names.len()
    }
}

/// Canonical breach record every source is normalized into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachRecord {
    pub entity_name: Option<String>,
    pub total_affected: Option<u64>,
    pub state_residents_affected: Option<u64>,
    pub date_reported: Option<NaiveDate>,
    pub reporting_state_agency: Agency,
    pub source_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_breach_occurred: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_breach_discovered: Option<NaiveDate>,
}

impl BreachRecord {
    /// Empty record attributed to `agency`.
    pub fn new(agency: Agency) -> Self {
        Self {
            entity_name: None,
            total_affected: None,
            state_residents_affected: None,
            date_reported: None,
            reporting_state_agency: agency,
            source_link: None,
            date_breach_occurred: None,
            date_breach_discovered: None,
        }
    }

    pub fn with_entity(mut self, name: &str) -> Self {
        self.entity_name = Some(name.to_string());
        self
    }

    pub fn with_date_reported(mut self, date: NaiveDate) -> Self {
        self.date_reported = Some(date);
        self
    }

    pub fn with_total_affected(mut self, count: u64) -> Self {
        self.total_affected = Some(count);
        self
    }

    pub fn with_state_residents_affected(mut self, count: u64) -> Self {
        self.state_residents_affected = Some(count);
        self
    }

    pub fn with_source_link(mut self, link: &str) -> Self {
        self.source_link = Some(link.to_string());
        self
    }

    /// Count of missing unified fields. The agency is never missing.
    pub fn missing_fields(&self) -> usize {
        [
            self.entity_name.is_none(),
            self.total_affected.is_none(),
            self.state_residents_affected.is_none(),
            self.date_reported.is_none(),
            self.source_link.is_none(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }
}

/// Finalized, chronologically sorted feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub records: Vec<BreachRecord>,
    pub generated_at: DateTime<Utc>,
}

impl Feed {
    pub fn new(records: Vec<BreachRecord>) -> Self {
        Self {
            records,
            generated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
