//! Per-peer reliability and activity tracking.
//!
//! Metrics live in the shared registry as a hash per peer and are created
//! lazily on the first delivery report. They are never explicitly
//! destroyed; the TTL re-applied on every write ages idle peers out.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReliabilityPolicy;
use crate::error::Result;
use crate::model::PeerMetrics;
use crate::registry::{keys, RegistryStore};

const FIELD_TOTAL_SEGMENTS: &str = "totalSegments";
const FIELD_PEER_SUCCESS_SEGMENTS: &str = "peerSuccessSegments";
const FIELD_SUCCESS_RATE: &str = "successRate";
const FIELD_LAST_ACTIVE: &str = "lastActive";

pub struct PeerMetricsService {
    registry: Arc<dyn RegistryStore>,
    policy: ReliabilityPolicy,
    ewma_alpha: f64,
    metrics_ttl: Duration,
}

impl PeerMetricsService {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        policy: ReliabilityPolicy,
        ewma_alpha: f64,
        metrics_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            policy,
            ewma_alpha,
            metrics_ttl,
        }
    }

    /// Record a delivery report and return the updated success rate.
    ///
    /// Every report counts toward total attempts; the success counter
    /// moves only when the segment actually came from a peer, the event
    /// this service exists to encourage and measure.
    pub async fn update_reliability(&self, client_id: &str, source: &str) -> Result<f64> {
        let key = keys::peer_metrics(client_id);
        let from_peer = !source.eq_ignore_ascii_case("origin");

        let total = self
            .registry
            .hash_incr(&key, FIELD_TOTAL_SEGMENTS, 1)
            .await?
            .max(1);

        let successes = if from_peer {
            self.registry
                .hash_incr(&key, FIELD_PEER_SUCCESS_SEGMENTS, 1)
                .await?
        } else {
            self.long_field(&key, FIELD_PEER_SUCCESS_SEGMENTS).await
        };

        let success_rate = match self.policy {
            ReliabilityPolicy::Cumulative => {
                if successes <= 0 {
                    0.0
                } else {
                    successes as f64 / total as f64
                }
            }
            ReliabilityPolicy::Ewma => {
                let previous = self
                    .registry
                    .hash_get_all(&key)
                    .await?
                    .get(FIELD_SUCCESS_RATE)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(0.5);
                let outcome = if from_peer { 1.0 } else { 0.0 };
                self.ewma_alpha * outcome + (1.0 - self.ewma_alpha) * previous
            }
        };

        let now = Utc::now().timestamp();
        self.registry
            .hash_put(&key, FIELD_SUCCESS_RATE, &success_rate.to_string())
            .await?;
        self.registry
            .hash_put(&key, FIELD_LAST_ACTIVE, &now.to_string())
            .await?;
        if let Err(e) = self.registry.expire(&key, self.metrics_ttl).await {
            tracing::warn!(key = %key, error = %e, "Failed to refresh metrics TTL");
        }

        tracing::debug!(
            client_id = %client_id,
            source = %source,
            total,
            successes,
            success_rate,
            "Updated peer reliability"
        );
        Ok(success_rate)
    }

    /// Timestamp touch on every inbound message, independent of delivery
    /// outcome, so idle-but-connected peers stay distinguishable from
    /// peers that stopped reporting.
    pub async fn mark_last_active(&self, client_id: &str) -> Result<i64> {
        let now = Utc::now().timestamp();
        let key = keys::peer_metrics(client_id);
        self.registry
            .hash_put(&key, FIELD_LAST_ACTIVE, &now.to_string())
            .await?;
        if let Err(e) = self.registry.expire(&key, self.metrics_ttl).await {
            tracing::warn!(key = %key, error = %e, "Failed to refresh metrics TTL");
        }
        Ok(now)
    }

    /// Raw metrics hash for a peer.
    pub async fn load_all(&self, client_id: &str) -> Result<HashMap<String, String>> {
        self.registry.hash_get_all(&keys::peer_metrics(client_id)).await
    }

    /// Decode a metrics hash into the wire shape; absent or malformed
    /// fields fall back to conservative defaults so new peers remain
    /// eligible candidates.
    pub fn decode(entries: &HashMap<String, String>) -> PeerMetrics {
        let defaults = PeerMetrics::unknown(Utc::now().timestamp());
        let mut last_active = entries
            .get(FIELD_LAST_ACTIVE)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if last_active == 0 {
            last_active = defaults.last_active;
        }
        PeerMetrics {
            upload_speed: entries
                .get("uploadSpeed")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.upload_speed),
            latency: entries
                .get("latency")
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| v as i64)
                .unwrap_or(defaults.latency),
            success_rate: entries
                .get(FIELD_SUCCESS_RATE)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.success_rate),
            last_active,
        }
    }

    async fn long_field(&self, key: &str, field: &str) -> i64 {
        match self.registry.hash_get_all(key).await {
            Ok(entries) => entries
                .get(field)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            Err(e) => {
                tracing::warn!(key = %key, field = %field, error = %e, "Failed to read metrics field");
                0
            }
        }
    }
}
