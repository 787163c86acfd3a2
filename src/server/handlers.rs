//! HTTP handlers for the dashboard.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

use super::templates;
use super::AppState;
use crate::cache::FeedStatus;
use crate::models::BreachRecord;
use crate::view;

const PAGE_TITLE: &str = "Recently Reported Data Breaches";

async fn load_feed(state: &AppState) -> FeedStatus {
    let pipeline = Arc::clone(&state.pipeline);
    state
        .cache
        .get_or_refresh(move || async move { pipeline.run().await })
        .await
}

/// Dashboard page: the recent window of the cached feed.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let today = Local::now().date_naive();
    let since = view::window_start(today, state.window_days);

    let (feed, stale) = match load_feed(&state).await {
        FeedStatus::Fresh(feed) => (feed, None),
        FeedStatus::Stale { feed, error } => (feed, Some(error)),
        FeedStatus::Failed(error) => {
            return Html(templates::base_template(
                PAGE_TITLE,
                &templates::failure_notice(&error),
            ))
        }
    };

    let mut content = stale
        .map(|error| templates::stale_notice(&error, feed.generated_at))
        .unwrap_or_default();
    if feed.is_empty() {
        content.push_str(&templates::no_data_notice());
    } else {
        let rows = view::display_rows(&feed.records, since);
        content.push_str(&templates::feed_section(
            &rows,
            since,
            state.window_days,
            feed.generated_at,
        ));
    }

    Html(templates::base_template(PAGE_TITLE, &content))
}

/// Force a recompute, then send the browser back to the dashboard.
pub async fn refresh(State(state): State<AppState>) -> Redirect {
    tracing::info!("Manual refresh requested");
    state.cache.invalidate().await;
    load_feed(&state).await;
    Redirect::to("/")
}

#[derive(Serialize)]
struct FeedResponse<'a> {
    generated_at: DateTime<Utc>,
    since: NaiveDate,
    stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    records: Vec<&'a BreachRecord>,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

/// The recent window of the feed as JSON.
pub async fn api_feed(State(state): State<AppState>) -> Response {
    let since = view::window_start(Local::now().date_naive(), state.window_days);

    let (feed, error) = match load_feed(&state).await {
        FeedStatus::Fresh(feed) => (feed, None),
        FeedStatus::Stale { feed, error } => (feed, Some(error)),
        FeedStatus::Failed(error) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse { error: &error }),
            )
                .into_response()
        }
    };

    Json(FeedResponse {
        generated_at: feed.generated_at,
        since,
        stale: error.is_some(),
        error: error.as_deref(),
        records: view::recent(&feed.records, since),
    })
    .into_response()
}

pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], templates::CSS)
}
