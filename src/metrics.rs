//! Prometheus metrics collection and HTTP request instrumentation.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
    middleware::Next,
};

/// Initialize the Prometheus metrics recorder and return the handle for rendering.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    builder
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Axum middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    let start = Instant::now();
    counter!("ss_http_requests_total", "method" => method.clone(), "path" => path.clone())
        .increment(1);

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();
    histogram!("ss_http_request_duration_seconds", "method" => method, "path" => path, "status" => status)
        .record(duration);

    response
}

/// Normalize URL paths to reduce label cardinality: movie/quality/segment
/// identifiers collapse to placeholders.
fn normalize_path(path: &str) -> String {
    let mut normalized: Vec<&str> = Vec::new();
    let mut collapse = false;
    for segment in path.split('/') {
        if collapse && !segment.is_empty() {
            normalized.push(":id");
        } else {
            normalized.push(segment);
            if segment == "movies" {
                collapse = true;
            }
        }
    }
    normalized.join("/")
}

/// Record a served segment, by cache outcome.
pub fn record_segment_served(cache_hit: bool) {
    let outcome = if cache_hit { "hit" } else { "miss" };
    counter!("ss_segments_served_total", "cache" => outcome.to_string()).increment(1);
}

/// Record an origin fetch attempt.
pub fn record_origin_fetch(found: bool) {
    let outcome = if found { "found" } else { "missing" };
    counter!("ss_origin_fetches_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record media segments evicted by the maintenance sweep.
pub fn record_evictions(count: u64) {
    counter!("ss_segments_evicted_total").increment(count);
}

/// Record an inbound signaling message by type.
pub fn record_signaling_message(message_type: &str) {
    counter!("ss_signaling_messages_total", "type" => message_type.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_segment_paths() {
        assert_eq!(
            normalize_path("/api/v1/streams/movies/m1/720p/seg_0001.m4s"),
            "/api/v1/streams/movies/:id/:id/:id"
        );
        assert_eq!(
            normalize_path("/api/v1/streams/movies/m1/master.m3u8"),
            "/api/v1/streams/movies/:id/:id"
        );
        assert_eq!(normalize_path("/health"), "/health");
    }
}
