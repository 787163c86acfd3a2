//! Per-source definitions: where each listing lives, how to fetch it, and how
//! its native columns map onto the unified record.

use std::collections::{HashMap, HashSet};

use crate::models::Agency;

/// How a source's listing is retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain HTTP GET; the page already contains the table.
    StaticTable { table_index: usize },
    /// Render in the headless browser, then read the table.
    RenderedTable { table_index: usize },
    /// Render, click a control that expands the listing, then read the table.
    ClickThenTable {
        selector: &'static str,
        table_index: usize,
    },
    /// Collect detail-page links from the index and read one key/value block
    /// per page.
    DetailPages {
        min_link_len: usize,
        content_selector: &'static str,
    },
}

impl FetchStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            FetchStrategy::StaticTable { .. } => "http",
            FetchStrategy::RenderedTable { .. } => "browser",
            FetchStrategy::ClickThenTable { .. } => "browser+click",
            FetchStrategy::DetailPages { .. } => "browser, detail pages",
        }
    }
}

/// Unified record field a native column feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    EntityName,
    TotalAffected,
    StateResidentsAffected,
    DateReported,
    DateBreachOccurred,
    DateBreachDiscovered,
    SourceLink,
}

/// One native column and its unified destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub native: &'static str,
    pub field: Field,
}

const fn col(native: &'static str, field: Field) -> ColumnMap {
    ColumnMap { native, field }
}

/// Where a record's `source_link` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Always the source's canonical listing page.
    Canonical,
    /// Only the mapped link column.
    Column,
    /// The mapped link column, or the canonical page when the cell is empty.
    ColumnOrCanonical,
}

/// Source-specific value quirk applied before coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueHook {
    None,
    /// Cells repeat their column label in front of the value.
    StripLabel,
    /// Dates use `YYYY.MM.DD`.
    DottedDates,
}

/// Everything needed to fetch and normalize one source.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub agency: Agency,
    /// Page the fetcher starts from.
    pub url: String,
    /// Page used as `source_link` when records have no link of their own.
    pub canonical_link: &'static str,
    pub fetch: FetchStrategy,
    /// Replacement header names, by position.
    pub positional_headers: Option<&'static [&'static str]>,
    pub columns: &'static [ColumnMap],
    pub link: LinkPolicy,
    pub hook: ValueHook,
}

impl SourceSpec {
    /// Native columns whose cells should yield an anchor href instead of text.
    pub fn link_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.field == Field::SourceLink)
            .map(|c| c.native)
            .collect()
    }
}

/// Key under which the detail page's own URL is stored.
pub const DETAIL_URL_KEY: &str = "URL";

const MAINE_COLUMNS: &[ColumnMap] = &[
    col("Entity Name", Field::EntityName),
    col(
        "Total number of persons affected (including residents)",
        Field::TotalAffected,
    ),
    col(
        "Total number of Maine residents affected",
        Field::StateResidentsAffected,
    ),
    col("Date(s) of consumer notification", Field::DateReported),
    col("Date(s) Breach Occured", Field::DateBreachOccurred),
    col("Date Breach Discovered", Field::DateBreachDiscovered),
    col(DETAIL_URL_KEY, Field::SourceLink),
];

const HHS_COLUMNS: &[ColumnMap] = &[
    col("Name of Covered Entity", Field::EntityName),
    col("Individuals Affected", Field::TotalAffected),
    col("Breach Submission Date", Field::DateReported),
];

const TEXAS_HEADERS: &[&str] = &[
    "Entity Name",
    "Entity or Individual Address",
    "City",
    "State",
    "Zip Code",
    "Type of Notification",
    "Total number of persons affected (including residents)",
    "Notice Provided to Consumers (Y/N)",
    "Method(s) of Notice to Consumers",
    "Date Published at OAG Website",
];

// The Texas listing only counts Texans despite the column name.
const TEXAS_COLUMNS: &[ColumnMap] = &[
    col("Entity Name", Field::EntityName),
    col(
        "Total number of persons affected (including residents)",
        Field::StateResidentsAffected,
    ),
    col("Date Published at OAG Website", Field::DateReported),
];

const WASHINGTON_COLUMNS: &[ColumnMap] = &[
    col("Organization Name", Field::EntityName),
    col("Date Reported", Field::DateReported),
    col(
        "Number of Washingtonians Affected",
        Field::StateResidentsAffected,
    ),
];

const HAWAII_COLUMNS: &[ColumnMap] = &[
    col("Breached Entity Name", Field::EntityName),
    col("Date Notified", Field::DateReported),
    col("Hawaii Residents Impacted", Field::StateResidentsAffected),
    col("Link to Letter", Field::SourceLink),
];

const CALIFORNIA_COLUMNS: &[ColumnMap] = &[
    col("Organization Name", Field::EntityName),
    col("Reported Date", Field::DateReported),
];

/// Built-in definition for one agency.
pub fn builtin(agency: Agency) -> SourceSpec {
    match agency {
        Agency::Maine => SourceSpec {
            agency,
            url: "https://www.maine.gov/agviewer/content/ag/985235c7-cb95-4be2-8792-a1252b4f8318/list.html".to_string(),
            canonical_link: "https://www.maine.gov/agviewer/content/ag/985235c7-cb95-4be2-8792-a1252b4f8318/list.html",
            fetch: FetchStrategy::DetailPages {
                min_link_len: 100,
                content_selector: "#content",
            },
            positional_headers: None,
            columns: MAINE_COLUMNS,
            link: LinkPolicy::Column,
            hook: ValueHook::None,
        },
        Agency::Hhs => SourceSpec {
            agency,
            url: "https://ocrportal.hhs.gov/ocr/breach/breach_report.jsf".to_string(),
            canonical_link: "https://ocrportal.hhs.gov/ocr/breach/breach_report.jsf",
            fetch: FetchStrategy::StaticTable { table_index: 1 },
            positional_headers: None,
            columns: HHS_COLUMNS,
            link: LinkPolicy::Canonical,
            hook: ValueHook::None,
        },
        Agency::Texas => SourceSpec {
            agency,
            url: "https://oag.my.site.com/datasecuritybreachreport/apex/DataSecurityReportsPage".to_string(),
            canonical_link: "https://oag.my.site.com/datasecuritybreachreport/apex/DataSecurityReportsPage",
            fetch: FetchStrategy::ClickThenTable {
                selector: "#mycdrs_last",
                table_index: 0,
            },
            positional_headers: Some(TEXAS_HEADERS),
            columns: TEXAS_COLUMNS,
            link: LinkPolicy::Canonical,
            hook: ValueHook::None,
        },
        Agency::Washington => SourceSpec {
            agency,
            url: "https://www.atg.wa.gov/data-breach-notifications".to_string(),
            canonical_link: "https://www.atg.wa.gov/data-breach-notifications",
            fetch: FetchStrategy::RenderedTable { table_index: 0 },
            positional_headers: None,
            columns: WASHINGTON_COLUMNS,
            link: LinkPolicy::Canonical,
            hook: ValueHook::StripLabel,
        },
        Agency::Hawaii => SourceSpec {
            agency,
            url: "https://cca.hawaii.gov/ocp/notices/security-breach/".to_string(),
            canonical_link: "https://cca.hawaii.gov/ocp/notices/security-breach/",
            fetch: FetchStrategy::RenderedTable { table_index: 0 },
            positional_headers: None,
            columns: HAWAII_COLUMNS,
            link: LinkPolicy::ColumnOrCanonical,
            hook: ValueHook::DottedDates,
        },
        Agency::California => SourceSpec {
            agency,
            url: "https://oag.ca.gov/privacy/databreach/list".to_string(),
            canonical_link: "https://oag.ca.gov/privacy/databreach/list",
            fetch: FetchStrategy::StaticTable { table_index: 0 },
            positional_headers: None,
            columns: CALIFORNIA_COLUMNS,
            link: LinkPolicy::Canonical,
            hook: ValueHook::None,
        },
    }
}

/// All built-in sources in pipeline order.
pub fn all() -> Vec<SourceSpec> {
    Agency::ALL.into_iter().map(builtin).collect()
}

/// Built-in sources minus disabled ones, with URL overrides applied.
pub fn configured(disabled: &HashSet<Agency>, url_overrides: &HashMap<Agency, String>) -> Vec<SourceSpec> {
    all()
        .into_iter()
        .filter(|spec| !disabled.contains(&spec.agency))
        .map(|mut spec| {
            if let Some(url) = url_overrides.get(&spec.agency) {
                spec.url = url.clone();
            }
            spec
        })
        .collect()
}
