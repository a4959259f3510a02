//! Route table.

use axum::routing::get;
use axum::Router;

use super::handlers::{health, segments};
use super::SharedState;
use crate::signaling::ws;

/// Build the application router.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::render_metrics))
        .route("/ws/signaling", get(ws::ws_handler))
        .route(
            "/api/v1/streams/movies/:movie_id/master.m3u8",
            get(segments::get_master_playlist),
        )
        .route(
            "/api/v1/streams/movies/:movie_id/:quality_id/:segment_id",
            get(segments::get_segment),
        )
        .with_state(state)
}
