//! Schema normalization: native per-source tables into unified records.

use tracing::debug;

use crate::coerce;
use crate::models::{BreachRecord, RawTable};
use crate::sources::{Field, LinkPolicy, SourceSpec, ValueHook};

/// Normalize one source's table.
///
/// Returns `None` when the table has no rows so the unifier can skip it.
/// Columns the source did not produce leave their unified field empty.
pub fn normalize(source: &SourceSpec, table: &RawTable) -> Option<Vec<BreachRecord>> {
    if table.is_empty() {
        return None;
    }

    for column in source.columns {
        if table.column_index(column.native).is_none() {
            debug!(
                "{}: column {:?} not present, leaving {:?} empty",
                source.agency, column.native, column.field
            );
        }
    }

    let records = (0..table.len())
        .map(|row| normalize_row(source, table, row))
        .collect();
    Some(records)
}

fn cell<'a>(source: &SourceSpec, table: &'a RawTable, row: usize, native: &str) -> Option<&'a str> {
    let value = table.value(row, native)?;
    let value = match source.hook {
        ValueHook::StripLabel => coerce::strip_label(value, native),
        ValueHook::None | ValueHook::DottedDates => value,
    };
    Some(value)
}

fn date(source: &SourceSpec, value: &str) -> Option<chrono::NaiveDate> {
    match source.hook {
        ValueHook::DottedDates => coerce::parse_dotted_date(value),
        ValueHook::None | ValueHook::StripLabel => coerce::parse_date(value),
    }
}

fn normalize_row(source: &SourceSpec, table: &RawTable, row: usize) -> BreachRecord {
    let mut record = BreachRecord::new(source.agency);

    for column in source.columns {
        let Some(value) = cell(source, table, row, column.native) else {
            continue;
        };
        match column.field {
            Field::EntityName => record.entity_name = coerce::non_empty(value),
            Field::TotalAffected => record.total_affected = coerce::parse_count(value),
            Field::StateResidentsAffected => {
                record.state_residents_affected = coerce::parse_count(value)
            }
            Field::DateReported => record.date_reported = date(source, value),
            Field::DateBreachOccurred => record.date_breach_occurred = date(source, value),
            Field::DateBreachDiscovered => record.date_breach_discovered = date(source, value),
            Field::SourceLink => record.source_link = coerce::non_empty(value),
        }
    }

    record.source_link = match source.link {
        LinkPolicy::Canonical => Some(source.canonical_link.to_string()),
        LinkPolicy::Column => record.source_link,
        LinkPolicy::ColumnOrCanonical => record
            .source_link
            .or_else(|| Some(source.canonical_link.to_string())),
    };

    record
}
