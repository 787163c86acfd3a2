//! Field extraction from fetched documents.
//!
//! Turns rendered HTML (or the visible text of a detail page) into a
//! [`RawTable`] keyed by the source's own column names.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::models::RawTable;
use crate::sources::DETAIL_URL_KEY;

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid table selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid row selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Separator between a label and its value on detail pages.
const KEY_VALUE_SEPARATOR: &str = ": ";

/// Errors that can occur while extracting fields from a document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Table {index} not found ({found} tables in document)")]
    TableNotFound { index: usize, found: usize },
}

/// Options for reading one table out of a document.
#[derive(Debug, Default)]
pub struct TableOptions<'a> {
    /// Which `<table>` in document order to read.
    pub index: usize,
    /// Base for resolving relative link cells.
    pub base_url: Option<&'a Url>,
    /// Header names that replace the extracted ones, by position.
    pub headers: Option<&'a [&'a str]>,
    /// Columns whose cells yield their anchor href instead of text.
    pub link_columns: &'a [&'a str],
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cell_text(cell: &ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&cell.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn cell_link(cell: &ElementRef<'_>, base_url: Option<&Url>) -> Option<String> {
    let href = cell.select(&ANCHOR).next()?.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let url = match base_url {
        Some(base) => base.join(href),
        None => Url::parse(href),
    }
    .ok()?;
    is_web_url(&url).then(|| url.to_string())
}

fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Direct `td`/`th` children of a row; nested tables are not descended into.
fn row_cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .collect()
}

fn in_thead(row: &ElementRef<'_>) -> bool {
    row.parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|p| p.value().name() == "thead")
}

/// Rows belonging to `table` itself, skipping rows of nested tables.
fn own_rows<'a>(table: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    table
        .select(&ROW)
        .filter(|row| {
            row.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .collect()
}

/// Read the `options.index`-th table of `html` into a [`RawTable`].
///
/// Headers come from `<thead>`, else from a leading all-`th` row, else are
/// numbered `0..n`. Empty cells become missing values.
pub fn extract_table(html: &str, options: &TableOptions<'_>) -> Result<RawTable, ExtractError> {
    let document = Html::parse_document(html);
    let tables: Vec<ElementRef<'_>> = document.select(&TABLE).collect();
    let table = tables
        .get(options.index)
        .ok_or(ExtractError::TableNotFound {
            index: options.index,
            found: tables.len(),
        })?;

    let rows = own_rows(table);

    let header_pos = rows
        .iter()
        .position(|row| in_thead(row))
        .or_else(|| {
            rows.first()
                .filter(|row| {
                    let cells = row_cells(row);
                    !cells.is_empty() && cells.iter().all(|c| c.value().name() == "th")
                })
                .map(|_| 0)
        });

    let body: Vec<&ElementRef<'_>> = rows
        .iter()
        .enumerate()
        .filter(|(i, row)| Some(*i) != header_pos && !in_thead(row))
        .map(|(_, row)| row)
        .filter(|row| row_cells(row).iter().any(|c| c.value().name() == "td"))
        .collect();

    let columns: Vec<String> = match header_pos {
        Some(pos) => row_cells(&rows[pos])
            .iter()
            .enumerate()
            .map(|(i, c)| cell_text(c).unwrap_or_else(|| i.to_string()))
            .collect(),
        None => {
            let width = body.iter().map(|r| row_cells(r).len()).max().unwrap_or(0);
            (0..width).map(|i| i.to_string()).collect()
        }
    };

    let mut raw = RawTable::new(columns);
    if let Some(headers) = options.headers {
        if !raw.rename_positional(headers) {
            tracing::warn!(
                "Table has {} columns but {} positional headers were given",
                raw.columns().len(),
                headers.len()
            );
        }
    }

    let is_link: Vec<bool> = raw
        .columns()
        .iter()
        .map(|c| options.link_columns.contains(&c.as_str()))
        .collect();

    for row in body {
        let values = row_cells(row)
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if is_link.get(i).copied().unwrap_or(false) {
                    cell_link(cell, options.base_url)
                } else {
                    cell_text(cell)
                }
            })
            .collect();
        raw.push_row(values);
    }

    Ok(raw)
}

/// Split visible page text into `key: value` pairs.
///
/// Only lines containing `": "` are kept, split at its first occurrence.
pub fn parse_key_values(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once(KEY_VALUE_SEPARATOR))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// One raw record for a detail page: its URL plus every key/value line.
pub fn detail_record(url: &str, text: &str) -> Vec<(String, String)> {
    let mut record = vec![(DETAIL_URL_KEY.to_string(), url.to_string())];
    record.extend(
        parse_key_values(text)
            .into_iter()
            .filter(|(key, _)| key != DETAIL_URL_KEY),
    );
    record
}

/// Absolute http(s) links on a page longer than `min_len` characters, in
/// document order without repeats.
///
/// Index pages mix navigation with per-record links; record links carry long
/// identifiers, so length separates the two.
pub fn discover_links(html: &str, base_url: &Url, min_len: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base_url.join(href.trim()).ok())
        .filter(is_web_url)
        .map(|url| url.to_string())
        .filter(|url| url.len() > min_len)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
