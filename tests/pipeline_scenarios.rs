//! End-to-end pipeline runs against canned source responses.
//!
//! A stub fetcher stands in for the network so each scenario controls exactly
//! what every source returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};

use breachfeed::cache::{FeedCache, FeedStatus};
use breachfeed::models::{Agency, RawTable};
use breachfeed::pipeline::{Pipeline, PipelineError, PipelineEvent, SourceOutcome};
use breachfeed::scrapers::{table_from_html, FetchError, SourceFetcher};
use breachfeed::sources::{self, FetchStrategy, SourceSpec};
use breachfeed::view;

enum Canned {
    Table(RawTable),
    Html(&'static str),
    Timeout,
}

#[derive(Default)]
struct StubFetcher {
    responses: HashMap<Agency, Canned>,
    calls: AtomicUsize,
}

impl StubFetcher {
    fn with(mut self, agency: Agency, response: Canned) -> Self {
        self.responses.insert(agency, response);
        self
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch(&self, source: &SourceSpec) -> Result<RawTable, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(&source.agency) {
            Some(Canned::Table(table)) => Ok(table.clone()),
            Some(Canned::Html(html)) => {
                let index = match source.fetch {
                    FetchStrategy::StaticTable { table_index }
                    | FetchStrategy::RenderedTable { table_index }
                    | FetchStrategy::ClickThenTable { table_index, .. } => table_index,
                    FetchStrategy::DetailPages { .. } => 0,
                };
                table_from_html(source, html, index)
            }
            Some(Canned::Timeout) => Err(FetchError::Timeout {
                selector: "#mycdrs_last".to_string(),
                waited: Duration::from_secs(10),
            }),
            None => Ok(RawTable::default()),
        }
    }
}

fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
    let mut table = RawTable::new(columns.iter().map(|c| c.to_string()).collect());
    for row in rows {
        table.push_row(row.iter().map(|v| Some(v.to_string())).collect());
    }
    table
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pipeline(fetcher: StubFetcher) -> Pipeline {
    Pipeline::new(sources::all(), Arc::new(fetcher))
}

// ============================================================================
// Source failures
// ============================================================================

#[tokio::test]
async fn one_failing_source_does_not_abort_the_run() {
    let fetcher = StubFetcher::default().with(Agency::Texas, Canned::Timeout);
    let mut events = Vec::new();

    let feed = pipeline(fetcher)
        .run_with_events(|event| events.push(event))
        .await
        .expect("partial failure is not an error");

    assert!(feed.is_empty());
    assert!(events.contains(&PipelineEvent::SourceFinished {
        agency: Agency::Texas,
        outcome: SourceOutcome::Failed(
            "Timed out after 10s waiting for #mycdrs_last".to_string()
        ),
    }));
    assert!(events.contains(&PipelineEvent::SourceFinished {
        agency: Agency::California,
        outcome: SourceOutcome::Loaded(0),
    }));
}

#[tokio::test]
async fn every_source_failing_is_an_error() {
    let mut fetcher = StubFetcher::default();
    for agency in Agency::ALL {
        fetcher = fetcher.with(agency, Canned::Timeout);
    }

    let err = pipeline(fetcher).run().await.unwrap_err();
    assert!(matches!(err, PipelineError::AllSourcesFailed { attempted: 6 }));
}

#[tokio::test]
async fn no_configured_sources_yields_empty_feed() {
    let fetcher = Arc::new(StubFetcher::default());
    let feed = Pipeline::new(Vec::new(), fetcher.clone()).run().await.unwrap();
    assert!(feed.is_empty());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Normalization through the pipeline
// ============================================================================

#[tokio::test]
async fn duplicate_across_sources_keeps_complete_row() {
    let fetcher = StubFetcher::default()
        .with(
            Agency::California,
            Canned::Table(table(
                &["Organization Name", "Reported Date"],
                &[&["Acme Co", "03/15/2024"]],
            )),
        )
        .with(
            Agency::Maine,
            Canned::Table(RawTable::from_records(vec![vec![
                ("URL".into(), "https://www.maine.gov/agviewer/detail/7".into()),
                ("Entity Name".into(), "Acme Co".into()),
                (
                    "Total number of persons affected (including residents)".into(),
                    "5,000".into(),
                ),
                ("Total number of Maine residents affected".into(), "40".into()),
                ("Date(s) of consumer notification".into(), "2024-03-15".into()),
            ]])),
        );

    let feed = pipeline(fetcher).run().await.unwrap();
    assert_eq!(feed.len(), 1);
    let record = &feed.records[0];
    assert_eq!(record.reporting_state_agency, Agency::Maine);
    assert_eq!(record.total_affected, Some(5000));
    assert_eq!(record.state_residents_affected, Some(40));
}

#[tokio::test]
async fn texas_count_with_trailing_text_is_parsed() {
    let fetcher = StubFetcher::default().with(
        Agency::Texas,
        Canned::Table(table(
            &[
                "Entity Name",
                "Total number of persons affected (including residents)",
                "Date Published at OAG Website",
            ],
            &[&["Acme Co", "1,234 people", "03/15/2024"]],
        )),
    );

    let feed = pipeline(fetcher).run().await.unwrap();
    assert_eq!(feed.records[0].state_residents_affected, Some(1234));
}

#[tokio::test]
async fn hawaii_dotted_date_is_parsed() {
    let fetcher = StubFetcher::default().with(
        Agency::Hawaii,
        Canned::Table(table(
            &["Date Notified", "Breached Entity Name", "Hawaii Residents Impacted"],
            &[&["2024.03.15", "Acme Co", "12"]],
        )),
    );

    let feed = pipeline(fetcher).run().await.unwrap();
    let record = &feed.records[0];
    assert_eq!(record.date_reported, Some(ymd(2024, 3, 15)));
    assert_eq!(
        record.source_link.as_deref(),
        Some("https://cca.hawaii.gov/ocp/notices/security-breach/")
    );
}

#[tokio::test]
async fn hawaii_script_link_falls_back_to_listing_page() {
    let html = r#"<table>
        <thead><tr>
            <th>Date Notified</th>
            <th>Breached Entity Name</th>
            <th>Hawaii Residents Impacted</th>
            <th>Link to Letter</th>
        </tr></thead>
        <tbody>
            <tr><td>2024.03.15</td><td>Acme Co</td><td>12</td><td><a href="javascript:alert(1)">Letter</a></td></tr>
            <tr><td>2024.03.14</td><td>Beta LLC</td><td>3</td><td><a href="/wp-content/beta.pdf">Letter</a></td></tr>
        </tbody>
    </table>"#;
    let fetcher = StubFetcher::default().with(Agency::Hawaii, Canned::Html(html));

    let feed = pipeline(fetcher).run().await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(
        feed.records[0].source_link.as_deref(),
        Some("https://cca.hawaii.gov/ocp/notices/security-breach/")
    );
    assert_eq!(
        feed.records[1].source_link.as_deref(),
        Some("https://cca.hawaii.gov/wp-content/beta.pdf")
    );
}

#[tokio::test]
async fn hhs_listing_reads_second_table() {
    let html = r#"<html><body>
        <table><tr><td>layout</td></tr></table>
        <table>
            <thead><tr>
                <th>Name of Covered Entity</th>
                <th>State</th>
                <th>Individuals Affected</th>
                <th>Breach Submission Date</th>
            </tr></thead>
            <tbody>
                <tr><td>Health Plan Inc</td><td>OH</td><td>12,500</td><td>03/15/2024</td></tr>
                <tr><td>Clinic LLC</td><td>TX</td><td>600</td><td>03/01/2024</td></tr>
            </tbody>
        </table>
    </body></html>"#;
    let fetcher = StubFetcher::default().with(Agency::Hhs, Canned::Html(html));

    let feed = pipeline(fetcher).run().await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed.records[0].entity_name.as_deref(), Some("Health Plan Inc"));
    assert_eq!(feed.records[0].total_affected, Some(12_500));
    assert_eq!(feed.records[1].date_reported, Some(ymd(2024, 3, 1)));
}

#[tokio::test]
async fn missing_table_counts_as_source_failure() {
    let fetcher = StubFetcher::default().with(Agency::Hhs, Canned::Html("<p>maintenance</p>"));
    let mut failed = Vec::new();

    pipeline(fetcher)
        .run_with_events(|event| {
            if let PipelineEvent::SourceFinished {
                agency,
                outcome: SourceOutcome::Failed(_),
            } = event
            {
                failed.push(agency);
            }
        })
        .await
        .unwrap();

    assert_eq!(failed, vec![Agency::Hhs]);
}

// ============================================================================
// Recent window
// ============================================================================

#[tokio::test]
async fn recent_window_keeps_last_two_weeks_newest_first() {
    let today = Local::now().date_naive();
    let fmt = |d: NaiveDate| d.format("%m/%d/%Y").to_string();
    let ten_ago = fmt(today.checked_sub_days(Days::new(10)).unwrap());
    let twenty_ago = fmt(today.checked_sub_days(Days::new(20)).unwrap());
    let today_str = fmt(today);

    let fetcher = StubFetcher::default().with(
        Agency::California,
        Canned::Table(table(
            &["Organization Name", "Reported Date"],
            &[
                &["Ten Days", ten_ago.as_str()],
                &["Twenty Days", twenty_ago.as_str()],
                &["Today", today_str.as_str()],
            ],
        )),
    );

    let feed = pipeline(fetcher).run().await.unwrap();
    let since = view::window_start(today, view::DEFAULT_WINDOW_DAYS);
    let names: Vec<_> = view::recent(&feed.records, since)
        .into_iter()
        .filter_map(|r| r.entity_name.as_deref())
        .collect();
    assert_eq!(names, vec!["Today", "Ten Days"]);
}

// ============================================================================
// Cached feed
// ============================================================================

#[tokio::test]
async fn cache_serves_previous_feed_when_refresh_fails() {
    let cache = FeedCache::new(Duration::from_secs(3600));
    let good = pipeline(StubFetcher::default().with(
        Agency::California,
        Canned::Table(table(
            &["Organization Name", "Reported Date"],
            &[&["Acme Co", "03/15/2024"]],
        )),
    ));
    let mut broken = StubFetcher::default();
    for agency in Agency::ALL {
        broken = broken.with(agency, Canned::Timeout);
    }
    let broken = pipeline(broken);

    let status = cache.get_or_refresh(|| good.run()).await;
    assert!(matches!(status, FeedStatus::Fresh(ref feed) if feed.len() == 1));

    cache.invalidate().await;
    match cache.get_or_refresh(|| broken.run()).await {
        FeedStatus::Stale { feed, error } => {
            assert_eq!(feed.records[0].entity_name.as_deref(), Some("Acme Co"));
            assert_eq!(error, "All 6 breach sources failed to load");
        }
        other => panic!("expected stale feed, got {:?}", other),
    }
}
