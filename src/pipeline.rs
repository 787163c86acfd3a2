//! The ETL pipeline: fetch each source, normalize, unify and finalize.
//!
//! Sources run one after another. A source that fails to fetch contributes
//! nothing and the run continues; only a run where every source failed is an
//! error.

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Settings;
use crate::models::{Agency, BreachRecord, Feed};
use crate::normalize::normalize;
use crate::scrapers::{BrowserFetcher, FetchError, HttpClient, LiveFetcher, SourceFetcher};
use crate::sources::SourceSpec;

/// Errors that abandon a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("All {attempted} breach sources failed to load")]
    AllSourcesFailed { attempted: usize },
}

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Fetched and normalized this many records (possibly zero).
    Loaded(usize),
    /// Fetch failed; the source contributed nothing.
    Failed(String),
}

/// Progress notifications emitted while a run is underway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    SourceStarted(Agency),
    SourceFinished {
        agency: Agency,
        outcome: SourceOutcome,
    },
}

/// Concatenate normalized outputs in order, skipping sources with no data.
pub fn unify(outputs: Vec<Option<Vec<BreachRecord>>>) -> Vec<BreachRecord> {
    outputs.into_iter().flatten().flatten().collect()
}

/// Compare optional values with missing values ordered after present ones.
fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Newest first; undated records last.
fn by_date_desc(a: &BreachRecord, b: &BreachRecord) -> Ordering {
    match (a.date_reported, b.date_reported) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Deduplicate and order the unified records.
///
/// Records sharing `(entity_name, date_reported)` collapse to the one with the
/// fewest missing fields; on a tie the earlier record in input order wins. A
/// missing occurrence date is backfilled from the discovery date. The result
/// is sorted by `date_reported`, newest first, undated last. Finalizing an
/// already finalized list returns it unchanged.
pub fn finalize(mut records: Vec<BreachRecord>) -> Vec<BreachRecord> {
    records.sort_by(|a, b| {
        missing_last(&a.entity_name, &b.entity_name)
            .then_with(|| missing_last(&a.date_reported, &b.date_reported))
            .then_with(|| a.missing_fields().cmp(&b.missing_fields()))
    });
    records.dedup_by(|later, kept| {
        later.entity_name == kept.entity_name && later.date_reported == kept.date_reported
    });

    for record in &mut records {
        if record.date_breach_occurred.is_none() && record.date_breach_discovered.is_some() {
            record.date_breach_occurred = record.date_breach_discovered;
        }
    }

    records.sort_by(by_date_desc);
    records
}

/// Runs every configured source through fetch, normalize, unify and finalize.
pub struct Pipeline {
    sources: Vec<SourceSpec>,
    fetcher: Arc<dyn SourceFetcher>,
}

impl Pipeline {
    pub fn new(sources: Vec<SourceSpec>, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { sources, fetcher }
    }

    /// Pipeline over the configured sources using live HTTP and browser fetching.
    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let http = HttpClient::new(
            settings.request_timeout(),
            settings.request_delay(),
            settings.user_agent.as_deref(),
        )?;
        let browser = BrowserFetcher::new(settings.browser_options());
        Ok(Self::new(
            settings.sources(),
            Arc::new(LiveFetcher::new(http, browser)),
        ))
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    /// Run the pipeline once.
    pub async fn run(&self) -> Result<Feed, PipelineError> {
        self.run_with_events(|_| {}).await
    }

    /// Run the pipeline once, reporting per-source progress.
    pub async fn run_with_events<F>(&self, mut on_event: F) -> Result<Feed, PipelineError>
    where
        F: FnMut(PipelineEvent) + Send,
    {
        let mut outputs = Vec::with_capacity(self.sources.len());
        let mut failed = 0;

        for source in &self.sources {
            on_event(PipelineEvent::SourceStarted(source.agency));

            let outcome = match self.fetcher.fetch(source).await {
                Ok(table) => {
                    let normalized = normalize(source, &table);
                    let count = normalized.as_ref().map_or(0, Vec::len);
                    info!("{}: {} records", source.agency, count);
                    outputs.push(normalized);
                    SourceOutcome::Loaded(count)
                }
                Err(e) => {
                    warn!("{}: skipping source: {}", source.agency, e);
                    failed += 1;
                    SourceOutcome::Failed(e.to_string())
                }
            };

            on_event(PipelineEvent::SourceFinished {
                agency: source.agency,
                outcome,
            });
        }

        if !self.sources.is_empty() && failed == self.sources.len() {
            return Err(PipelineError::AllSourcesFailed { attempted: failed });
        }

        let records = finalize(unify(outputs));
        info!("Feed ready with {} records", records.len());
        Ok(Feed::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(agency: Agency, name: &str, date: Option<NaiveDate>) -> BreachRecord {
        let mut record = BreachRecord::new(agency).with_entity(name);
        record.date_reported = date;
        record
    }

    #[test]
    fn test_unify_skips_absent_outputs() {
        let a = record(Agency::Maine, "A", None);
        let b = record(Agency::Texas, "B", None);
        let unified = unify(vec![Some(vec![a.clone()]), None, Some(vec![]), Some(vec![b.clone()])]);
        assert_eq!(unified, vec![a, b]);
    }

    #[test]
    fn test_unify_and_finalize_empty() {
        assert!(unify(Vec::new()).is_empty());
        assert!(unify(vec![None, None]).is_empty());
        assert!(finalize(Vec::new()).is_empty());
    }

    #[test]
    fn test_finalize_keeps_most_complete_duplicate() {
        let date = Some(ymd(2024, 3, 15));
        let sparse = record(Agency::Texas, "Acme Co", date);
        let complete = record(Agency::Maine, "Acme Co", date)
            .with_total_affected(100)
            .with_state_residents_affected(5)
            .with_source_link("https://example.com/acme");

        let result = finalize(vec![sparse, complete.clone()]);
        assert_eq!(result, vec![complete]);
    }

    #[test]
    fn test_finalize_tie_keeps_first_in_input() {
        let date = Some(ymd(2024, 3, 15));
        let first = record(Agency::California, "Acme Co", date);
        let second = record(Agency::Washington, "Acme Co", date);
        let result = finalize(vec![first.clone(), second]);
        assert_eq!(result, vec![first]);
    }

    #[test]
    fn test_finalize_keeps_same_entity_on_different_dates() {
        let a = record(Agency::Hhs, "Acme Co", Some(ymd(2024, 3, 1)));
        let b = record(Agency::Hhs, "Acme Co", Some(ymd(2024, 3, 15)));
        let result = finalize(vec![a.clone(), b.clone()]);
        assert_eq!(result, vec![b, a]);
    }

    #[test]
    fn test_finalize_sorts_newest_first_undated_last() {
        let old = record(Agency::Hhs, "Old", Some(ymd(2023, 1, 1)));
        let undated = record(Agency::Hhs, "Undated", None);
        let new = record(Agency::Hhs, "New", Some(ymd(2024, 6, 1)));
        let result = finalize(vec![old.clone(), undated.clone(), new.clone()]);
        assert_eq!(result, vec![new, old, undated]);
    }

    #[test]
    fn test_finalize_backfills_occurred_from_discovered() {
        let mut only_discovered = record(Agency::Maine, "A", Some(ymd(2024, 3, 15)));
        only_discovered.date_breach_discovered = Some(ymd(2024, 2, 1));

        let mut both = record(Agency::Maine, "B", Some(ymd(2024, 3, 15)));
        both.date_breach_discovered = Some(ymd(2024, 2, 1));
        both.date_breach_occurred = Some(ymd(2024, 1, 1));

        let result = finalize(vec![only_discovered, both]);
        assert_eq!(result[0].date_breach_occurred, Some(ymd(2024, 2, 1)));
        assert_eq!(result[1].date_breach_occurred, Some(ymd(2024, 1, 1)));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let date = Some(ymd(2024, 3, 15));
        let input = vec![
            record(Agency::Texas, "Acme Co", date),
            record(Agency::Maine, "Acme Co", date).with_total_affected(7),
            record(Agency::Hhs, "Globex", Some(ymd(2024, 3, 20))),
            record(Agency::Hhs, "Initech", date),
            record(Agency::California, "Umbrella", None),
            BreachRecord::new(Agency::Hawaii),
            BreachRecord::new(Agency::Hawaii).with_date_reported(ymd(2024, 1, 1)),
        ];

        let once = finalize(input);
        let twice = finalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_finalize_collapses_unnamed_records_on_same_date() {
        let date = ymd(2024, 1, 1);
        let a = BreachRecord::new(Agency::Hawaii).with_date_reported(date);
        let b = BreachRecord::new(Agency::Hawaii)
            .with_date_reported(date)
            .with_state_residents_affected(3);
        let result = finalize(vec![a, b.clone()]);
        assert_eq!(result, vec![b]);
    }
}
