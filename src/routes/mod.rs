mod health;
mod metrics;
mod video_feed;

use crate::server::SharedState;
use axum::{routing::get, Router};

pub use health::healthcheck;
pub use metrics::metrics_handler;
pub use video_feed::video_feed;

/// Every GET path on the stream listener serves the relayed stream.
pub fn stream_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(video_feed))
        .route("/{*path}", get(video_feed))
}

pub fn metrics_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
}
