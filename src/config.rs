//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// How the peer reliability score is maintained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityPolicy {
    /// Lifetime success ratio (peer-sourced deliveries / total deliveries).
    Cumulative,
    /// Exponentially weighted moving average; recent outcomes dominate.
    Ewma,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (host:port)
    pub bind_address: String,

    /// Root directory of the local segment cache
    pub cache_path: PathBuf,

    /// Redis connection URL; when unset the in-process registry is used
    pub redis_url: Option<String>,

    /// TTL applied to segment/peer registry keys
    pub segment_ttl: Duration,

    /// TTL for peer lastSeen and metrics keys
    pub peer_last_seen_ttl: Duration,

    /// Interval between cache maintenance sweeps
    pub maintenance_interval: Duration,

    /// Age beyond which media segments are evicted from the cache
    pub cache_window: Duration,

    /// Whether origin fallback fetching is enabled
    pub origin_enabled: bool,

    /// Origin bucket name (when origin fetching is enabled)
    pub origin_bucket: Option<String>,

    /// Origin region
    pub origin_region: String,

    /// Origin endpoint URL (for MinIO or other S3-compatible services)
    pub origin_endpoint: Option<String>,

    /// Key prefix for segment objects at the origin
    pub origin_object_prefix: String,

    /// Extension candidates tried when fetching media segments
    pub media_extensions: Vec<String>,

    /// Peer reliability scoring policy
    pub reliability_policy: ReliabilityPolicy,

    /// Smoothing factor for the EWMA reliability policy
    pub reliability_ewma_alpha: f64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            cache_path: env::var("CACHE_PATH")
                .unwrap_or_else(|_| "cache".into())
                .into(),
            redis_url: env::var("REDIS_URL").ok(),
            segment_ttl: duration_var("SEGMENT_TTL_SECS", 90),
            peer_last_seen_ttl: duration_var("PEER_LAST_SEEN_TTL_SECS", 180),
            maintenance_interval: duration_var("MAINTENANCE_INTERVAL_SECS", 30),
            cache_window: duration_var("CACHE_WINDOW_SECS", 240),
            origin_enabled: env::var("ORIGIN_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(true),
            origin_bucket: env::var("ORIGIN_BUCKET").ok(),
            origin_region: env::var("ORIGIN_REGION").unwrap_or_else(|_| "us-east-1".into()),
            origin_endpoint: env::var("ORIGIN_ENDPOINT").ok(),
            origin_object_prefix: env::var("ORIGIN_OBJECT_PREFIX")
                .unwrap_or_else(|_| "movies".into()),
            media_extensions: env::var("MEDIA_SEGMENT_EXTENSIONS")
                .unwrap_or_else(|_| "m4s,mp4".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            reliability_policy: match env::var("RELIABILITY_POLICY").as_deref() {
                Ok("ewma") => ReliabilityPolicy::Ewma,
                Ok("cumulative") | Err(_) => ReliabilityPolicy::Cumulative,
                Ok(other) => {
                    return Err(AppError::Config(format!(
                        "Unknown RELIABILITY_POLICY '{}' (expected 'cumulative' or 'ewma')",
                        other
                    )))
                }
            },
            reliability_ewma_alpha: env::var("RELIABILITY_EWMA_ALPHA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.2),
        })
    }
}

fn duration_var(name: &str, default_secs: u64) -> Duration {
    let secs = env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
