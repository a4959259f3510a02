//! Signaling registry operations: registration, discovery, delivery
//! reports, disconnect cleanup.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::peer_metrics::PeerMetricsService;
use super::protocol::{PeerInfo, PeerListMessage, ReportAck, WhoHasReply};
use crate::error::Result;
use crate::events::StreamEventHub;
use crate::registry::{keys, RegistryStore};

pub struct SignalingService {
    registry: Arc<dyn RegistryStore>,
    peer_metrics: Arc<PeerMetricsService>,
    events: Arc<StreamEventHub>,
    segment_ttl: Duration,
    peer_last_seen_ttl: Duration,
}

impl SignalingService {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        peer_metrics: Arc<PeerMetricsService>,
        events: Arc<StreamEventHub>,
        segment_ttl: Duration,
        peer_last_seen_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            peer_metrics,
            events,
            segment_ttl,
            peer_last_seen_ttl,
        }
    }

    /// Register a client for a movie stream and return the current peer
    /// set as the bootstrap snapshot.
    pub async fn register_client(&self, client_id: &str, movie_id: &str) -> Result<PeerListMessage> {
        tracing::info!(client_id = %client_id, movie_id = %movie_id, "Client connected");

        self.events.ensure_subscribed(movie_id);
        self.touch_last_seen(client_id).await;

        let peer_key = keys::movie_peers(movie_id);
        self.registry.set_add(&peer_key, client_id).await?;
        if let Err(e) = self.registry.expire(&peer_key, self.segment_ttl).await {
            tracing::warn!(key = %peer_key, error = %e, "Failed to set peer set TTL");
        }

        let mut peers: Vec<String> = self
            .registry
            .set_members(&peer_key)
            .await?
            .into_iter()
            .collect();
        peers.sort();

        Ok(PeerListMessage {
            movie_id: movie_id.to_string(),
            peers,
        })
    }

    /// Which peers claim to hold a segment, decorated with their metrics
    /// so the client can rank candidates.
    pub async fn who_has(
        &self,
        movie_id: &str,
        quality_id: Option<&str>,
        segment_id: &str,
    ) -> Result<WhoHasReply> {
        let owners_key = keys::segment_owners(movie_id, quality_id, segment_id);
        let peer_ids = self.registry.set_members(&owners_key).await?;

        if peer_ids.is_empty() {
            tracing::debug!(
                movie_id = %movie_id,
                segment_id = %segment_id,
                "No peers found for segment"
            );
            return Ok(WhoHasReply {
                segment_id: segment_id.to_string(),
                peers: Vec::new(),
            });
        }

        let mut peers = Vec::with_capacity(peer_ids.len());
        for peer_id in peer_ids {
            let metrics = match self.peer_metrics.load_all(&peer_id).await {
                Ok(entries) => PeerMetricsService::decode(&entries),
                Err(e) => {
                    tracing::warn!(peer_id = %peer_id, error = %e, "Failed to load peer metrics");
                    PeerMetricsService::decode(&Default::default())
                }
            };
            peers.push(PeerInfo { peer_id, metrics });
        }
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));

        tracing::debug!(
            movie_id = %movie_id,
            segment_id = %segment_id,
            count = peers.len(),
            "Found peers for segment"
        );
        Ok(WhoHasReply {
            segment_id: segment_id.to_string(),
            peers,
        })
    }

    /// Record that a client now holds a segment (or pulled it from the
    /// origin), updating registry membership and the peer's reliability.
    #[allow(clippy::too_many_arguments)]
    pub async fn report_segment(
        &self,
        client_id: &str,
        movie_id: &str,
        quality_id: Option<&str>,
        segment_id: &str,
        source: &str,
        speed: f64,
        latency: i64,
    ) -> Result<ReportAck> {
        let owners_key = keys::segment_owners(movie_id, quality_id, segment_id);
        self.registry.set_add(&owners_key, client_id).await?;
        if let Err(e) = self.registry.expire(&owners_key, self.segment_ttl).await {
            tracing::warn!(key = %owners_key, error = %e, "Failed to set owners TTL");
        }

        let peer_key = keys::movie_peers(movie_id);
        self.registry.set_add(&peer_key, client_id).await?;
        if let Err(e) = self.registry.expire(&peer_key, self.segment_ttl).await {
            tracing::warn!(key = %peer_key, error = %e, "Failed to set peer set TTL");
        }

        let success_rate = self.peer_metrics.update_reliability(client_id, source).await?;
        let last_active = self.peer_metrics.mark_last_active(client_id).await?;

        let metrics_key = keys::peer_metrics(client_id);
        for (field, value) in [
            ("uploadSpeed", speed.to_string()),
            ("latency", latency.to_string()),
            ("successRate", success_rate.to_string()),
            ("lastActive", last_active.to_string()),
        ] {
            if let Err(e) = self.registry.hash_put(&metrics_key, field, &value).await {
                tracing::warn!(key = %metrics_key, field, error = %e, "Failed to write metric field");
            }
        }

        tracing::info!(
            client_id = %client_id,
            movie_id = %movie_id,
            quality_id = quality_id.unwrap_or("-"),
            segment_id = %segment_id,
            latency_ms = latency,
            speed_mbps = speed,
            "Peer reported segment"
        );
        Ok(ReportAck {
            segment_id: segment_id.to_string(),
        })
    }

    /// Explicit retraction: the client evicted the segment locally.
    pub async fn remove_segment(
        &self,
        client_id: &str,
        movie_id: &str,
        quality_id: Option<&str>,
        segment_id: &str,
    ) -> Result<()> {
        let owners_key = keys::segment_owners(movie_id, quality_id, segment_id);
        let removed = self.registry.set_remove(&owners_key, client_id).await?;
        if removed {
            tracing::info!(
                client_id = %client_id,
                movie_id = %movie_id,
                segment_id = %segment_id,
                "Client retracted segment"
            );
        } else {
            tracing::debug!(
                client_id = %client_id,
                segment_id = %segment_id,
                "Retraction for segment the client was not listed as owning"
            );
        }
        Ok(())
    }

    /// Disconnect cleanup: drop the peer from the movie-level set and
    /// from every segment-owner set it appears in. Idempotent, and store
    /// failures never propagate into the transport teardown.
    pub async fn handle_disconnect(&self, client_id: &str, movie_id: &str) {
        tracing::info!(client_id = %client_id, movie_id = %movie_id, "Client disconnected");

        let pattern = keys::segment_owners_pattern(movie_id);
        match self.registry.scan_keys(&pattern).await {
            Ok(owner_keys) => {
                for key in owner_keys {
                    if let Err(e) = self.registry.set_remove(&key, client_id).await {
                        tracing::warn!(key = %key, error = %e, "Failed to remove peer from owner set");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(movie_id = %movie_id, error = %e, "Failed to scan owner keys");
            }
        }

        let peer_key = keys::movie_peers(movie_id);
        if let Err(e) = self.registry.set_remove(&peer_key, client_id).await {
            tracing::warn!(key = %peer_key, error = %e, "Failed to remove peer from movie set");
        }
    }

    async fn touch_last_seen(&self, client_id: &str) {
        let key = keys::peer_last_seen(client_id);
        let now = Utc::now().timestamp().to_string();
        if let Err(e) = self
            .registry
            .put_value(&key, &now, self.peer_last_seen_ttl)
            .await
        {
            tracing::warn!(key = %key, error = %e, "Failed to touch lastSeen");
        }
    }
}
