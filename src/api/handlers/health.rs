//! Health and metrics endpoints.
//!
//! Resource exhaustion (an unwritable cache root, a dead registry) is
//! surfaced here rather than as per-request failures on the serving path.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::SharedState;

/// `GET /health`
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let cache_writable = probe_cache_writable(&state).await;

    let registry_ok = match state.registry.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Registry health probe failed");
            false
        }
    };

    let healthy = cache_writable && registry_ok;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "cacheWritable": cache_writable,
        "registry": if registry_ok { "up" } else { "down" },
        "connectedPeers": state.connections.len().await,
        "originEnabled": state.origin.is_enabled(),
    });

    (status_code, Json(body))
}

async fn probe_cache_writable(state: &SharedState) -> bool {
    let probe = state.config.cache_path.join(".health-probe");
    match tokio::fs::write(&probe, b"ok").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe).await;
            true
        }
        Err(e) => {
            tracing::warn!(path = %probe.display(), error = %e, "Cache root not writable");
            false
        }
    }
}

/// `GET /metrics`
pub async fn render_metrics(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
