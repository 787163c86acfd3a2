//! breachfeed: aggregates public data breach notifications from state and
//! federal sources into one deduplicated feed.

pub mod cache;
pub mod coerce;
pub mod config;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod scrapers;
pub mod server;
pub mod sources;
pub mod view;

pub use config::Settings;
pub use models::{Agency, BreachRecord, Feed, RawTable};
pub use pipeline::{Pipeline, PipelineError};
