//! Web dashboard for the breach feed.
//!
//! Serves the recent-window table, a manual refresh action and a JSON view of
//! the full feed. The feed is computed on demand and held in a TTL cache.

mod handlers;
mod routes;
mod templates;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;

use crate::cache::FeedCache;
use crate::config::Settings;
use crate::pipeline::Pipeline;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<FeedCache>,
    pub pipeline: Arc<Pipeline>,
    pub window_days: u32,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let pipeline = Pipeline::from_settings(settings)?;
        Ok(Self::with_pipeline(
            pipeline,
            FeedCache::new(settings.cache_ttl()),
            settings.window_days,
        ))
    }

    pub fn with_pipeline(pipeline: Pipeline, cache: FeedCache, window_days: u32) -> Self {
        Self {
            cache: Arc::new(cache),
            pipeline: Arc::new(pipeline),
            window_days,
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
