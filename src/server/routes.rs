//! Route table for the dashboard.

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/refresh", post(handlers::refresh))
        .route("/api/feed", get(handlers::api_feed))
        .route("/static/style.css", get(handlers::stylesheet))
        .with_state(state)
}
