//! Source fetchers: retrieve each listing and hand back its native table.

pub mod browser;
pub mod http_client;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::extract::{self, ExtractError, TableOptions};
use crate::models::RawTable;
use crate::sources::{FetchStrategy, SourceSpec};

pub use browser::{BrowserFetcher, BrowserOptions, BrowserSession};
pub use http_client::HttpClient;

/// Errors that can occur while fetching one source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("No usable browser (missing binary or built without the browser feature)")]
    BrowserUnavailable,

    #[error("Timed out after {waited:?} waiting for {selector}")]
    Timeout { selector: String, waited: Duration },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Retrieves one source's listing as a native-vocabulary table.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceSpec) -> Result<RawTable, FetchError>;
}

/// Fetcher backed by real HTTP requests and a headless browser.
pub struct LiveFetcher {
    http: HttpClient,
    browser: BrowserFetcher,
}

impl LiveFetcher {
    pub fn new(http: HttpClient, browser: BrowserFetcher) -> Self {
        Self { http, browser }
    }

    async fn rendered_table(
        &self,
        source: &SourceSpec,
        click: Option<&str>,
        table_index: usize,
    ) -> Result<RawTable, FetchError> {
        let session = self.browser.launch().await?;
        let html: Result<String, FetchError> = async {
            let html = session.open(&source.url).await?;
            match click {
                Some(selector) => {
                    session.click_when_ready(selector).await?;
                    session.content().await
                }
                None => Ok(html),
            }
        }
        .await;
        session.close().await;

        table_from_html(source, &html?, table_index)
    }

    async fn detail_pages(
        &self,
        source: &SourceSpec,
        min_link_len: usize,
        content_selector: &str,
    ) -> Result<RawTable, FetchError> {
        let base = parse_url(&source.url)?;
        let session = self.browser.launch().await?;
        let records = collect_detail_records(&session, &base, min_link_len, content_selector).await;
        session.close().await;

        Ok(RawTable::from_records(records?))
    }
}

async fn collect_detail_records(
    session: &BrowserSession,
    index_url: &Url,
    min_link_len: usize,
    content_selector: &str,
) -> Result<Vec<Vec<(String, String)>>, FetchError> {
    let index_html = session.open(index_url.as_str()).await?;
    let links = extract::discover_links(&index_html, index_url, min_link_len);
    info!("Found {} detail pages on {}", links.len(), index_url);

    let delay = session.options().request_delay;
    let mut records = Vec::with_capacity(links.len());
    for link in links {
        match session.inner_text(&link, content_selector).await {
            Ok(text) => {
                debug!("Read detail page {}", link);
                records.push(extract::detail_record(&link, &text));
            }
            Err(e) => warn!("Skipping detail page {}: {}", link, e),
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(records)
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Read the source's table out of a fetched document.
pub fn table_from_html(
    source: &SourceSpec,
    html: &str,
    table_index: usize,
) -> Result<RawTable, FetchError> {
    let base = Url::parse(&source.url).ok();
    let link_columns = source.link_columns();
    let options = TableOptions {
        index: table_index,
        base_url: base.as_ref(),
        headers: source.positional_headers,
        link_columns: &link_columns,
    };
    Ok(extract::extract_table(html, &options)?)
}

#[async_trait]
impl SourceFetcher for LiveFetcher {
    async fn fetch(&self, source: &SourceSpec) -> Result<RawTable, FetchError> {
        match &source.fetch {
            FetchStrategy::StaticTable { table_index } => {
                let html = self.http.get_text(&source.url).await?;
                table_from_html(source, &html, *table_index)
            }
            FetchStrategy::RenderedTable { table_index } => {
                self.rendered_table(source, None, *table_index).await
            }
            FetchStrategy::ClickThenTable {
                selector,
                table_index,
            } => {
                self.rendered_table(source, Some(*selector), *table_index)
                    .await
            }
            FetchStrategy::DetailPages {
                min_link_len,
                content_selector,
            } => {
                self.detail_pages(source, *min_link_len, content_selector)
                    .await
            }
        }
    }
}
