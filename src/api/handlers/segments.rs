//! Segment serving endpoints.
//!
//! Resolution order: validated identifiers -> local cache -> origin
//! fallback (write-through + registry announce) -> 404. Total misses and
//! unreadable files both answer 404 so client retry logic can treat
//! "not yet available" uniformly; origin trouble never surfaces as a 5xx
//! on this path.

use axum::extract::{Path, State};
use axum::response::Response;

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::seeder::{file_server, locator, validate};

/// `GET /api/v1/streams/movies/{movieId}/master.m3u8`
pub async fn get_master_playlist(
    State(state): State<SharedState>,
    Path(movie_id): Path<String>,
) -> Result<Response> {
    serve_segment(&state, &movie_id, None, "master.m3u8").await
}

/// `GET /api/v1/streams/movies/{movieId}/{qualityId}/{segmentId}`
///
/// Covers init segments, variant playlists and media segments; the
/// segment id is the complete filename.
pub async fn get_segment(
    State(state): State<SharedState>,
    Path((movie_id, quality_id, segment_id)): Path<(String, String, String)>,
) -> Result<Response> {
    serve_segment(&state, &movie_id, Some(&quality_id), &segment_id).await
}

async fn serve_segment(
    state: &SharedState,
    movie_id: &str,
    quality_id: Option<&str>,
    segment_id: &str,
) -> Result<Response> {
    if !validate::is_valid_movie_id(movie_id) {
        return Err(AppError::Validation("invalid movieId".into()));
    }
    if let Some(q) = quality_id {
        if !validate::is_safe_identifier(q) {
            return Err(AppError::Validation("invalid qualityId".into()));
        }
    }
    if !validate::is_safe_identifier(segment_id) {
        return Err(AppError::Validation("invalid segmentId".into()));
    }

    let cached = locator::locate(&state.config.cache_path, movie_id, quality_id, segment_id);
    let cache_hit = cached.is_some();

    let path = match cached {
        Some(path) => Some(path),
        None => {
            let fetched = state
                .origin
                .fetch_from_origin(movie_id, quality_id, segment_id)
                .await;
            metrics::record_origin_fetch(fetched.is_some());
            match fetched {
                Some(segment) => {
                    // This node now holds the segment and can act as a
                    // seed of last resort for signaling queries.
                    state.seeder.register_fetched(&segment).await;
                    Some(segment.path)
                }
                None => None,
            }
        }
    };

    let path = match path {
        Some(path) => path,
        None => {
            tracing::debug!(
                movie_id = %movie_id,
                quality_id = quality_id.unwrap_or("-"),
                segment_id = %segment_id,
                "Segment not found in cache or origin"
            );
            return Err(AppError::NotFound(format!("Segment not found: {}", segment_id)));
        }
    };

    metrics::record_segment_served(cache_hit);
    Ok(file_server::serve(&path).await)
}
